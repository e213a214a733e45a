use super::Signature;

/// An iterator over the complete types of a [`Signature`].
///
/// Assumes the underlying bytes have passed validation.
pub struct Iter<'a> {
    bytes: &'a [u8],
}

impl<'a> Iter<'a> {
    #[inline]
    pub(super) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

/// The length of the first complete type in `bytes`, which is assumed to
/// start one.
pub(crate) fn complete_type_len(bytes: &[u8]) -> Option<usize> {
    let mut n = 0;

    // Leading array markers belong to the element that follows.
    while bytes.get(n) == Some(&b'a') {
        n += 1;
    }

    match bytes.get(n)? {
        b'(' | b'{' => {
            let mut depth = 0usize;

            loop {
                match bytes.get(n)? {
                    b'(' | b'{' => depth += 1,
                    b')' | b'}' => {
                        depth -= 1;

                        if depth == 0 {
                            return Some(n + 1);
                        }
                    }
                    _ => {}
                }

                n += 1;
            }
        }
        _ => Some(n + 1),
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Signature;

    fn next(&mut self) -> Option<Self::Item> {
        let n = complete_type_len(self.bytes)?;
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        // SAFETY: A complete type out of a valid signature is itself a valid
        // signature.
        Some(unsafe { Signature::new_unchecked(head) })
    }
}
