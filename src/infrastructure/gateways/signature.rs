use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Hex HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign_sha256(secret: &str, body: &[u8]) -> String {
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    }
}

/// Hex HMAC-SHA512 of `body` keyed with `secret`.
pub fn sign_sha512(secret: &str, body: &[u8]) -> String {
    match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    }
}

/// Constant-time check of a hex HMAC-SHA256 signature.
pub fn verify_sha256(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(body);
            mac.verify_slice(&expected).is_ok()
        }
        Err(_) => false,
    }
}

/// Constant-time check of a hex HMAC-SHA512 signature.
pub fn verify_sha512(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(body);
            mac.verify_slice(&expected).is_ok()
        }
        Err(_) => false,
    }
}
