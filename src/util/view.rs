use std::fmt;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Write;
use std::iter::Iterator;
use std::marker::PhantomData;

/// Types that can be viewed as a fixed-length little-endian byte sequence.
pub trait Viewable: Sized {
    fn size() -> usize;
    fn view(buf: &[u8]) -> Self;
}

macro_rules! def_viewable_le {
    ($t:ty, $size:expr) => {
        impl Viewable for $t {
            fn size() -> usize { $size }
            fn view(buf: &[u8]) -> $t {
                let mut bytes = [0u8; $size];
                bytes.copy_from_slice(&buf[..$size]);
                <$t>::from_le_bytes(bytes)
            }
        }
    }
}

impl Viewable for u8 {
    fn size() -> usize { 1 }
    fn view(buf: &[u8]) -> u8 { buf[0] }
}

def_viewable_le!(u16, 2);
def_viewable_le!(u32, 4);
def_viewable_le!(u64, 8);
def_viewable_le!(i16, 2);
def_viewable_le!(i32, 4);

impl Viewable for f32 {
    fn size() -> usize { 4 }
    fn view(buf: &[u8]) -> f32 { f32::from_bits(u32::view(buf)) }
}

impl<T,S> Viewable for (T,S) where
    T: Viewable,
    S: Viewable
{
    fn size() -> usize { <T as Viewable>::size() + <S as Viewable>::size() }
    fn view(buf: &[u8]) -> (T,S) {
        let split = <T as Viewable>::size();
        let t = <T as Viewable>::view(&buf[..split]);
        let s = <S as Viewable>::view(&buf[split..]);
        (t,s)
    }
}

impl<T,S,P> Viewable for (T,S,P) where
    T: Viewable,
    S: Viewable,
    P: Viewable,
{
    fn size() -> usize { <(T,(S,P)) as Viewable>::size() }
    fn view(buf: &[u8]) -> (T,S,P) {
        let (t,(s,p)) = <(T,(S,P)) as Viewable>::view(buf);
        (t,s,p)
    }
}

/// An byte buffer interpreted as an array of Viewable elements.
#[derive(Copy, Clone)]
pub struct View<'a, T> {
    buf: &'a [u8],
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Viewable> View<'a, T> {
    pub fn from_buf(buf: &[u8]) -> View<T> {
        let size = <T as Viewable>::size();
        assert!(size == 0 || buf.len() % size == 0);
        View { buf, _marker: PhantomData }
    }

    pub fn len(&self) -> usize {
        let size = <T as Viewable>::size();
        self.buf.len() / size
    }

    pub fn get(&self, pos: usize) -> T {
        let size = <T as Viewable>::size();
        let begin = size * pos;
        let end = begin + size;
        if end > self.buf.len() {
            panic!("index {} out of range for view of length {}", pos, self.len());
        }
        <T as Viewable>::view(&self.buf[begin..end])
    }
}

impl<'a, T: Viewable + Debug> Debug for View<'a, T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "View [")?;
        if self.len() != 0 {
            write!(f, "{:?}", self.get(0))?;
            for i in 1..self.len() {
                write!(f, ", {:?}", self.get(i))?;
            }
        }
        f.write_char(']')
    }
}

impl<'a, T: Viewable> Iterator for View<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.buf.is_empty() {
            None
        } else {
            let size = <T as Viewable>::size();
            let item = <T as Viewable>::view(&self.buf[0..size]);
            self.buf = &self.buf[size..];
            Some(item)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }
}

impl<'a, T: Viewable> ExactSizeIterator for View<'a, T> {}

#[test]
fn test_view() {
    let buf = [0x01, 0x00, 0x00, 0x80, 0x00, 0x00, 0x80, 0x3f];
    assert_eq!(u32::view(&buf), 0x8000_0001);
    assert_eq!(f32::view(&buf[4..]), 1.0);
    assert_eq!(i32::view(&[0xff, 0xff, 0xff, 0xff]), -1);

    let pairs: View<(u16, u16)> = View::from_buf(&buf);
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs.get(1), (0, 0x3f80));
    assert_eq!(pairs.collect::<Vec<_>>(), vec![(1, 0x8000), (0, 0x3f80)]);
}
