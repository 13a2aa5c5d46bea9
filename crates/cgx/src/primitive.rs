//! Fixed-width values that travel through the command stream.

/// Trait for the integer and float widths carried by the command stream.
///
/// Everything on the wire is big-endian, regardless of the host.
pub trait Primitive: Copy + Default {
    /// Writes this value as big-endian into the start of `buf`.
    fn write_be_bytes(self, buf: &mut [u8]);

    /// Reads a big-endian value from the start of `buf`.
    fn read_be_bytes(buf: &[u8]) -> Self;
}

macro_rules! impl_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Primitive for $ty {
                #[inline(always)]
                fn write_be_bytes(self, buf: &mut [u8]) {
                    buf[..size_of::<$ty>()].copy_from_slice(&self.to_be_bytes());
                }

                #[inline(always)]
                fn read_be_bytes(buf: &[u8]) -> Self {
                    let mut bytes = [0; size_of::<$ty>()];
                    bytes.copy_from_slice(&buf[..size_of::<$ty>()]);
                    Self::from_be_bytes(bytes)
                }
            }
        )*
    };
}

impl_primitive!(u8, u16, u32, f32);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn floats_keep_their_bit_pattern() {
        let mut buf = [0; 4];
        (-240.0f32).write_be_bytes(&mut buf);
        assert_eq!(u32::from_be_bytes(buf), (-240.0f32).to_bits());
        assert_eq!(f32::read_be_bytes(&buf).to_bits(), (-240.0f32).to_bits());
    }
}
