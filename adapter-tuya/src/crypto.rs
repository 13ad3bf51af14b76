//! AES-128 primitives and session-key negotiation for the local Tuya
//! protocol. Versions 3.1/3.3 encrypt every frame under the device's
//! static `local_key`; 3.4/3.5 negotiate a session key once at connect
//! time and use it in place of the local key, still under AES-128-ECB.

use aes::Aes128;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use rand::RngCore;

use hub_core::error::{HubError, Result};

type EcbEnc = ecb::Encryptor<Aes128>;
type EcbDec = ecb::Decryptor<Aes128>;

const BLOCK_SIZE: usize = 16;

pub fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    out.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    out
}

pub fn pkcs7_unpad(data: &[u8]) -> Result<Vec<u8>> {
    let pad_len = *data.last().ok_or_else(|| HubError::ParseError("empty payload".into()))? as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return Err(HubError::ParseError("invalid pkcs7 padding".into()));
    }
    Ok(data[..data.len() - pad_len].to_vec())
}

pub fn aes128_ecb_encrypt(plain: &[u8], key: &[u8; 16]) -> Vec<u8> {
    let padded = pkcs7_pad(plain);
    let mut buf = padded;
    let enc = EcbEnc::new(key.into());
    let out_len = buf.len();
    let ct = enc
        .encrypt_padded_mut::<ecb::cipher::block_padding::NoPadding>(&mut buf, out_len)
        .expect("buffer sized exactly to block count");
    ct.to_vec()
}

pub fn aes128_ecb_decrypt(cipher: &[u8], key: &[u8; 16]) -> Result<Vec<u8>> {
    if cipher.is_empty() || cipher.len() % BLOCK_SIZE != 0 {
        return Err(HubError::ParseError("ciphertext not block-aligned".into()));
    }
    let mut buf = cipher.to_vec();
    let dec = EcbDec::new(key.into());
    let pt = dec
        .decrypt_padded_mut::<ecb::cipher::block_padding::NoPadding>(&mut buf)
        .map_err(|e| HubError::ProtocolError(format!("aes-ecb decrypt failed: {e}")))?;
    pkcs7_unpad(pt)
}

/// AES key material for one device connection: the static key always,
/// and a negotiated session key once 3.4/3.5 negotiation completes.
#[derive(Clone)]
pub struct TuyaCrypto {
    local_key: [u8; 16],
    session_key: Option<[u8; 16]>,
    local_nonce: [u8; 16],
}

impl TuyaCrypto {
    pub fn new(local_key: [u8; 16]) -> Self {
        let mut local_nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut local_nonce);
        Self { local_key, session_key: None, local_nonce }
    }

    pub fn local_nonce(&self) -> &[u8; 16] {
        &self.local_nonce
    }

    pub fn has_session_key(&self) -> bool {
        self.session_key.is_some()
    }

    /// Derives the session key from the remote's nonce per the negotiated
    /// handshake: `aes128_ecb_encrypt(local_nonce XOR remote_nonce, local_key)`
    /// truncated to 16 bytes.
    pub fn complete_negotiation(&mut self, remote_nonce: &[u8]) -> Result<()> {
        if remote_nonce.len() != 16 {
            return Err(HubError::ProtocolError("remote nonce must be 16 bytes".into()));
        }
        let mut xored = [0u8; 16];
        for i in 0..16 {
            xored[i] = self.local_nonce[i] ^ remote_nonce[i];
        }
        let derived = aes128_ecb_encrypt_raw_block(&xored, &self.local_key);
        let mut key = [0u8; 16];
        key.copy_from_slice(&derived[..16]);
        self.session_key = Some(key);
        Ok(())
    }

    fn active_key(&self) -> &[u8; 16] {
        self.session_key.as_ref().unwrap_or(&self.local_key)
    }

    pub fn encrypt(&self, plain: &[u8]) -> Vec<u8> {
        aes128_ecb_encrypt(plain, self.active_key())
    }

    pub fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>> {
        aes128_ecb_decrypt(cipher, self.active_key())
    }
}

/// Single-block ECB encrypt with no padding, used only for session-key
/// derivation where the input is already exactly one block.
fn aes128_ecb_encrypt_raw_block(block: &[u8; 16], key: &[u8; 16]) -> [u8; 16] {
    use aes::cipher::{BlockEncrypt, KeyInit as AesKeyInit};
    let cipher = Aes128::new(key.into());
    let mut b = aes::Block::clone_from_slice(block);
    cipher.encrypt_block(&mut b);
    let mut out = [0u8; 16];
    out.copy_from_slice(&b);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkcs7_pad_unpad_round_trips() {
        let data = b"hello tuya".to_vec();
        let padded = pkcs7_pad(&data);
        assert_eq!(padded.len() % BLOCK_SIZE, 0);
        assert_eq!(pkcs7_unpad(&padded).unwrap(), data);
    }

    #[test]
    fn ecb_encrypt_decrypt_round_trips() {
        let key = *b"0123456789abcdef";
        let plain = br#"{"dps":{"1":true}}"#;
        let cipher = aes128_ecb_encrypt(plain, &key);
        let decrypted = aes128_ecb_decrypt(&cipher, &key).unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn session_negotiation_is_symmetric_between_peers() {
        let mut a = TuyaCrypto::new(*b"0123456789abcdef");
        let mut b = TuyaCrypto::new(*b"0123456789abcdef");
        let a_nonce = *a.local_nonce();
        let b_nonce = *b.local_nonce();
        a.complete_negotiation(&b_nonce).unwrap();
        b.complete_negotiation(&a_nonce).unwrap();
        assert_eq!(a.session_key, b.session_key);
    }
}
