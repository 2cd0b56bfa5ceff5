//! Small helpers shared by the binary-structure modules.

/// Declares a getter that decodes a little-endian field from a byte-array newtype's backing
/// storage (`self.0`). Every on-disk record in this crate is represented this way rather than as
/// a `#[repr(C)]` struct transmuted over raw bytes, since transmuting over raw bytes does not
/// account for platform-dependent struct padding.
macro_rules! field {
    ($get_name:ident, $typ:ident, $start:expr, $size:expr) => {
        pub fn $get_name(&self) -> $typ {
            let mut buf: [u8; $size] = [0; $size];
            buf.copy_from_slice(&self.0[$start..$start + $size]);
            $typ::from_le_bytes(buf)
        }
    };
}

pub(crate) fn ceil_div(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

pub(crate) use field;
