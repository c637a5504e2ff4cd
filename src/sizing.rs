//! Compile-time sizing helpers.

/// Largest element of a fixed-size list, usable in `const` context.
///
/// Returns `0` for an empty list.
///
/// ```
/// const QUEUE: usize = cloudlink::max_of([8, 32, 16]);
/// assert_eq!(QUEUE, 32);
/// ```
pub const fn max_of<const N: usize>(sizes: [usize; N]) -> usize {
    let mut max = 0;
    let mut i = 0;
    while i < N {
        if sizes[i] > max {
            max = sizes[i];
        }
        i += 1;
    }
    max
}
