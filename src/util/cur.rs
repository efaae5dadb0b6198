use crate::errors::Result;
use crate::util::view::{View, Viewable};
use std::fmt;

/// A pointer into a buffer of bytes. Used for binary file parsing.
#[derive(Copy, Clone)]
pub struct Cur<'a> {
    buf_: &'a [u8],
    pos_: usize,
}

impl<'a> Cur<'a> {
    pub fn new(buf: &[u8]) -> Cur {
        Cur { buf_: buf, pos_: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos_
    }

    pub fn bytes_remaining(&self) -> usize {
        self.buf_.len().saturating_sub(self.pos_)
    }

    pub fn next<T: Viewable>(&mut self) -> Result<T> {
        let size = <T as Viewable>::size();
        let buf = self.next_n_u8s(size)?;
        Ok(<T as Viewable>::view(buf))
    }

    pub fn next_n<T: Viewable>(&mut self, n: usize) -> Result<View<'a, T>> {
        let size = <T as Viewable>::size();
        let len = match size.checked_mul(n) {
            Some(len) => len,
            None => bail!("array of {} elements is too long", n),
        };
        let buf = self.next_n_u8s(len)?;
        Ok(View::from_buf(buf))
    }

    pub fn next_n_u8s(&mut self, n: usize) -> Result<&'a [u8]> {
        let end_pos = match self.pos_.checked_add(n) {
            Some(end) if end <= self.buf_.len() => end,
            _ => bail!(
                "buffer was too short: wanted {} bytes at {:#x}, have {}",
                n, self.pos_, self.bytes_remaining(),
            ),
        };
        let res = &self.buf_[self.pos_..end_pos];
        self.pos_ = end_pos;
        Ok(res)
    }

    /// Reads bytes up to (not including) `delim`, consuming the delimiter.
    /// Fails if the delimiter doesn't occur within `max_len` bytes.
    pub fn next_until(&mut self, delim: u8, max_len: usize) -> Result<&'a [u8]> {
        let rest = self.slice_from_cur_to_end();
        let limit = rest.len().min(max_len);
        match rest[..limit].iter().position(|&b| b == delim) {
            Some(len) => {
                self.pos_ += len + 1;
                Ok(&rest[..len])
            }
            None => bail!("no terminator found within {} bytes at {:#x}", limit, self.pos_),
        }
    }

    pub fn slice_from_cur_to_end(&self) -> &'a [u8] {
        &self.buf_[self.pos_.min(self.buf_.len())..]
    }

    pub fn jump_forward(&mut self, amt: usize) {
        let pos = self.pos_;
        self.jump_to(pos + amt);
    }

    pub fn jump_to(&mut self, pos: usize) {
        self.pos_ = pos;
    }
}

impl<'a> fmt::Debug for Cur<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Cur {{ pos: {} }}", self.pos())
    }
}

#[test]
fn test_cur() {
    let buf = b"BSA\0\x69\x00\x00\x00Gamebryo\nrest";
    let mut cur = Cur::new(&buf[..]);
    assert_eq!(cur.next_n_u8s(4).unwrap(), b"BSA\0");
    assert_eq!(cur.next::<u32>().unwrap(), 105);
    assert_eq!(cur.next_until(b'\n', 64).unwrap(), b"Gamebryo");
    assert_eq!(cur.bytes_remaining(), 4);
    assert!(cur.next::<u64>().is_err());
    // A failed read doesn't move the cursor
    assert_eq!(cur.slice_from_cur_to_end(), b"rest");
}
