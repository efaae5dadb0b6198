//! Extracting bitfields from integers.
//!
//! If `x` is an unsigned integer, `x.bits(lo, hi)` is a number of
//! the same type with the bits of `x` in the range [`lo`, `hi`) in
//! its low part. `x.bit(n)` tests a single bit.
//!
//! # Examples
//! ```ignore
//! let alpha_flags = 0x12edu16;
//! assert_eq!(alpha_flags.bits(1, 5), 6);
//! assert!(alpha_flags.bit(9));
//! ```

pub trait BitField: Sized {
    fn bits(self, lo: u32, hi: u32) -> Self;
    fn bit(self, n: u32) -> bool;
}

macro_rules! def_bitfield {
    ($t:ty, $bitwidth:expr) => {
        impl BitField for $t {
            #[inline(always)]
            fn bits(self, lo: u32, hi: u32) -> $t {
                assert!(lo < hi);
                assert!(hi <= $bitwidth);
                (self >> lo) & (!0 >> ($bitwidth - (hi - lo) as $t))
            }

            #[inline(always)]
            fn bit(self, n: u32) -> bool {
                self.bits(n, n + 1) != 0
            }
        }
    }
}

def_bitfield!(u8, 8);
def_bitfield!(u16, 16);
def_bitfield!(u32, 32);
def_bitfield!(u64, 64);

#[test]
fn test() {
    let x = 0xabcdef00u32;
    assert_eq!(x.bits(8, 16), 0xef);
    assert_eq!(x.bits(16, 28), 0xbcd);
    assert!(x.bit(31));
    assert!(!x.bit(0));

    let alpha_flags = 0x12edu16;
    assert_eq!(alpha_flags.bits(1, 5), 6);
    assert_eq!(alpha_flags.bits(5, 9), 7);
    assert_eq!(alpha_flags.bits(10, 13), 4);

    let vertex_desc = 0x0430_0000_0000_0008u64;
    assert_eq!(vertex_desc.bits(44, 56), 0x043);
    assert_eq!(vertex_desc.bits(0, 4), 8);
}
