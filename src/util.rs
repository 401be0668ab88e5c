// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
use chrono::Local;

/// Hex digits needed to render a register on this architecture.
#[cfg(target_pointer_width = "64")]
pub const REG_HEX_CHARS: usize = 16;
#[cfg(target_pointer_width = "32")]
pub const REG_HEX_CHARS: usize = 8;

/// Render a register value as a `0x`-prefixed literal, zero-padded to the
/// architecture register width. Filenames, reports, and the callstack hash
/// all consume this exact form.
pub fn reg_literal(value: u64) -> String {
    format!("{:#0width$x}", value, width = REG_HEX_CHARS + 2)
}

/// Render an address the way C's `%p` does: `(nil)` for null, unpadded
/// `0x…` otherwise.
pub fn ptr_literal(value: u64) -> String {
    if value == 0 {
        "(nil)".to_string()
    } else {
        format!("{:#x}", value)
    }
}

/// Local wall-clock stamp appended to non-unique crash filenames.
pub fn local_time_stamp() -> String {
    Local::now().format("%F.%H:%M:%S").to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reg_literal_padding() {
        #[cfg(target_pointer_width = "64")]
        {
            assert_eq!(reg_literal(0x4011a0), "0x00000000004011a0");
            assert_eq!(reg_literal(0), "0x0000000000000000");
        }
        #[cfg(target_pointer_width = "32")]
        {
            assert_eq!(reg_literal(0x4011a0), "0x004011a0");
        }
        // The final three characters are the low nibbles, always
        let lit = reg_literal(0xdeadbeef);
        assert_eq!(&lit[lit.len() - 3..], "eef");
    }

    #[test]
    fn test_ptr_literal() {
        assert_eq!(ptr_literal(0), "(nil)");
        assert_eq!(ptr_literal(0x602000000014), "0x602000000014");
    }

    #[test]
    fn test_time_stamp_shape() {
        let ts = local_time_stamp();
        // %F.%H:%M:%S => 2021-01-01.00:00:00
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], ".");
    }
}
