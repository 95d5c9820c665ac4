/// Splits `items` into exactly `parts` contiguous chunks (at least one).
///
/// Chunk sizes differ by at most one and the remainder goes to the earliest chunks, so the
/// same input and part count always yield the same boundaries. Trailing chunks are empty
/// when `parts` exceeds the item count.
pub fn split_into_chunks<T>(items: &[T], parts: usize) -> Vec<&[T]> {
    let parts = parts.max(1);
    let base = items.len() / parts;
    let extra = items.len() % parts;

    let mut chunks = Vec::with_capacity(parts);
    let mut start = 0;
    for idx in 0..parts {
        let len = base + usize::from(idx < extra);
        chunks.push(&items[start..start + len]);
        start += len;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_goes_to_leading_chunks() {
        let items: Vec<u32> = (0..10).collect();
        let chunks = split_into_chunks(&items, 3);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(chunks[0], &[0, 1, 2, 3]);
        assert_eq!(chunks[2], &[7, 8, 9]);
    }

    #[test]
    fn concatenation_reconstructs_input_for_many_shapes() {
        for len in 0..40usize {
            let items: Vec<usize> = (0..len).collect();
            for parts in 1..12usize {
                let chunks = split_into_chunks(&items, parts);
                assert_eq!(chunks.len(), parts);
                let max = chunks.iter().map(|c| c.len()).max().unwrap_or(0);
                let min = chunks.iter().map(|c| c.len()).min().unwrap_or(0);
                assert!(max - min <= 1, "len={len} parts={parts}");
                let joined: Vec<usize> = chunks.concat();
                assert_eq!(joined, items);
            }
        }
    }

    #[test]
    fn zero_parts_behaves_like_one() {
        let items = [1, 2, 3];
        let chunks = split_into_chunks(&items, 0);
        assert_eq!(chunks, vec![&items[..]]);
    }
}
