//! DSKY key symbol to channel-update mapping
//!
//! The panel's scan-code layer (outside this crate) reduces hardware
//! keys to the logical symbols below. Each press maps to a write on the
//! keyboard channel 0o15 with the low 5 bits valid, except PRO, which
//! lives on bit 14 of channel 0o32 and is the only key whose release is
//! reported separately: the bit is *clear* while held and set when let
//! go.

use crate::frame::ChannelUpdate;

/// Keyboard channel for everything except PRO
const KEY_CHANNEL: u8 = 0o15;
/// Validity mask for keyboard codes (low 5 bits)
const KEY_MASK: u16 = 0o37;
/// Channel carrying the PRO key bit
const PRO_CHANNEL: u8 = 0o32;
/// PRO key bit (active low)
const PRO_MASK: u16 = 0o20000;

/// Consecutive RESET presses that request a shutdown
const RESET_EXIT_COUNT: u32 = 5;

/// A logical DSKY key symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySymbol {
    /// Digit keys 0-9
    Digit(u8),
    /// `+` sign key
    Plus,
    /// `-` sign key
    Minus,
    /// VERB key
    Verb,
    /// NOUN key
    Noun,
    /// CLR key
    ClearEntry,
    /// KEY REL key
    KeyRelease,
    /// RSET key
    Reset,
    /// ENTR key
    Enter,
    /// PRO key pressed (held)
    Proceed,
    /// PRO key released
    ProceedReleased,
}

/// Result of feeding one key symbol to the keypad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Send this update to the computer
    Update(ChannelUpdate),
    /// Five consecutive RSET presses: the operator wants out
    RequestShutdown,
    /// Not a valid key (e.g. a digit above 9)
    Ignored,
}

/// Tracks the little bit of state key handling needs (the RSET
/// shutdown chord).
#[derive(Debug, Default)]
pub struct Keypad {
    reset_count: u32,
}

impl Keypad {
    /// Create a new keypad
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one key symbol to its channel update
    pub fn press(&mut self, key: KeySymbol) -> KeyOutcome {
        if key == KeySymbol::Reset {
            self.reset_count += 1;
            if self.reset_count >= RESET_EXIT_COUNT {
                return KeyOutcome::RequestShutdown;
            }
        } else {
            self.reset_count = 0;
        }

        let code = match key {
            KeySymbol::Digit(0) => 0o20,
            KeySymbol::Digit(d @ 1..=9) => u16::from(d),
            KeySymbol::Digit(_) => return KeyOutcome::Ignored,
            KeySymbol::Plus => 0o32,
            KeySymbol::Minus => 0o33,
            KeySymbol::Verb => 0o21,
            KeySymbol::Noun => 0o37,
            KeySymbol::ClearEntry => 0o36,
            KeySymbol::KeyRelease => 0o31,
            KeySymbol::Reset => 0o22,
            KeySymbol::Enter => 0o34,
            KeySymbol::Proceed => {
                return KeyOutcome::Update(ChannelUpdate::new_unchecked(PRO_CHANNEL, 0, PRO_MASK))
            }
            KeySymbol::ProceedReleased => {
                return KeyOutcome::Update(ChannelUpdate::new_unchecked(
                    PRO_CHANNEL,
                    PRO_MASK,
                    PRO_MASK,
                ))
            }
        };

        KeyOutcome::Update(ChannelUpdate::new_unchecked(KEY_CHANNEL, code, KEY_MASK))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(outcome: KeyOutcome) -> ChannelUpdate {
        match outcome {
            KeyOutcome::Update(u) => u,
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn verb_entry_sequence() {
        // V 3 5 ENTR, the classic lamp-test entry.
        let mut keypad = Keypad::new();
        let keys = [
            KeySymbol::Verb,
            KeySymbol::Digit(3),
            KeySymbol::Digit(5),
            KeySymbol::Enter,
        ];
        let codes: Vec<u16> = keys
            .iter()
            .map(|&k| update(keypad.press(k)).value())
            .collect();
        assert_eq!(codes, vec![0o21, 0o3, 0o5, 0o34]);

        for &k in &keys {
            let u = update(Keypad::new().press(k));
            assert_eq!(u.channel(), 0o15);
            assert_eq!(u.mask(), 0o37);
        }
    }

    #[test]
    fn zero_has_its_own_code() {
        let u = update(Keypad::new().press(KeySymbol::Digit(0)));
        assert_eq!(u.value(), 0o20);
    }

    #[test]
    fn proceed_press_and_release() {
        let mut keypad = Keypad::new();
        let press = update(keypad.press(KeySymbol::Proceed));
        assert_eq!(press.channel(), 0o32);
        assert_eq!(press.value(), 0);
        assert_eq!(press.mask(), 0o20000);

        let release = update(keypad.press(KeySymbol::ProceedReleased));
        assert_eq!(release.value(), 0o20000);
    }

    #[test]
    fn five_resets_request_shutdown() {
        let mut keypad = Keypad::new();
        for _ in 0..4 {
            assert!(matches!(
                keypad.press(KeySymbol::Reset),
                KeyOutcome::Update(_)
            ));
        }
        assert_eq!(keypad.press(KeySymbol::Reset), KeyOutcome::RequestShutdown);
    }

    #[test]
    fn other_key_resets_the_chord() {
        let mut keypad = Keypad::new();
        for _ in 0..4 {
            keypad.press(KeySymbol::Reset);
        }
        keypad.press(KeySymbol::Verb);
        for _ in 0..4 {
            assert!(matches!(
                keypad.press(KeySymbol::Reset),
                KeyOutcome::Update(_)
            ));
        }
    }

    #[test]
    fn invalid_digit_is_ignored() {
        assert_eq!(Keypad::new().press(KeySymbol::Digit(12)), KeyOutcome::Ignored);
    }
}
