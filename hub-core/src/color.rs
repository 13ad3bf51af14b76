use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue 0-359, saturation and value 0-100 (percent).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hsv {
    pub h: u16,
    pub s: u8,
    pub v: u8,
}

pub fn hsv_to_rgb(hsv: Hsv) -> Rgb {
    let h = (hsv.h % 360) as f64;
    let s = hsv.s.min(100) as f64 / 100.0;
    let v = hsv.v.min(100) as f64 / 100.0;

    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r1, g1, b1) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgb {
        r: (((r1 + m) * 255.0).round()) as u8,
        g: (((g1 + m) * 255.0).round()) as u8,
        b: (((b1 + m) * 255.0).round()) as u8,
    }
}

pub fn rgb_to_hsv(rgb: Rgb) -> Hsv {
    let r = rgb.r as f64 / 255.0;
    let g = rgb.g as f64 / 255.0;
    let b = rgb.b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    let s = if max == 0.0 { 0.0 } else { delta / max };
    let v = max;

    Hsv {
        h: h.round() as u16 % 360,
        s: (s * 100.0).round() as u8,
        v: (v * 100.0).round() as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_wheel_corners() {
        assert_eq!(hsv_to_rgb(Hsv { h: 0, s: 0, v: 0 }), Rgb { r: 0, g: 0, b: 0 });
        assert_eq!(hsv_to_rgb(Hsv { h: 120, s: 100, v: 100 }), Rgb { r: 0, g: 255, b: 0 });
        assert_eq!(hsv_to_rgb(Hsv { h: 240, s: 100, v: 100 }), Rgb { r: 0, g: 0, b: 255 });
        assert_eq!(hsv_to_rgb(Hsv { h: 60, s: 100, v: 100 }), Rgb { r: 255, g: 255, b: 0 });
        assert_eq!(hsv_to_rgb(Hsv { h: 300, s: 100, v: 100 }), Rgb { r: 255, g: 0, b: 255 });
    }

    #[test]
    fn round_trip_within_one_unit() {
        for r in (0..=255u16).step_by(17) {
            for g in (0..=255u16).step_by(17) {
                for b in (0..=255u16).step_by(17) {
                    let rgb = Rgb { r: r as u8, g: g as u8, b: b as u8 };
                    let back = hsv_to_rgb(rgb_to_hsv(rgb));
                    assert!((back.r as i16 - rgb.r as i16).abs() <= 1, "{:?} -> {:?}", rgb, back);
                    assert!((back.g as i16 - rgb.g as i16).abs() <= 1, "{:?} -> {:?}", rgb, back);
                    assert!((back.b as i16 - rgb.b as i16).abs() <= 1, "{:?} -> {:?}", rgb, back);
                }
            }
        }
    }
}
