//! One-time login codes.
//!
//! A code is minted when an email is accepted and stored on the chat row; it
//! binds the following password attempt to a single login window. The user
//! never sees or types it; expiry of the code, not knowledge of it, is what
//! the window enforces.

use rand_core::{OsRng, RngCore};

const CODE_BYTES: usize = 16;

/// 32 lowercase hex characters from the operating system RNG.
pub fn generate() -> String {
  let mut buf = [0u8; CODE_BYTES];
  OsRng.fill_bytes(&mut buf);
  hex::encode(buf)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes_are_32_hex_chars() {
    let code = generate();
    assert_eq!(code.len(), 32);
    assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn codes_do_not_repeat() {
    assert_ne!(generate(), generate());
  }
}
