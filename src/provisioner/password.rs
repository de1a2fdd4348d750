//! Monitoring user password generation.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of generated passwords.
pub const PASSWORD_LENGTH: usize = 16;

/// Generates a random password of ASCII letters and digits.
///
/// Uses the thread-local CSPRNG, which is seeded from the operating system.
pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}
