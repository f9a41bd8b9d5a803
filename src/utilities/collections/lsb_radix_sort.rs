//! Least-significant-byte radix sort over `u32` keys with an attached value array.
//!
//! The broad phase sorts each world's projected interval starts with this, one world segment at a
//! time. Floats are mapped through [`sortable_key`] first so that unsigned key order matches
//! numeric order.

/// Maps a float to a key whose unsigned order matches the float's numeric order.
/// Negative zero maps to the same key as positive zero.
#[inline(always)]
pub fn sortable_key(value: f32) -> u32 {
    let bits = (value + 0.0).to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

/// Inverse of [`sortable_key`].
#[cfg(test)]
fn from_sortable_key(key: u32) -> f32 {
    if key & 0x8000_0000 != 0 {
        f32::from_bits(key & 0x7FFF_FFFF)
    } else {
        f32::from_bits(!key)
    }
}

fn reorder_for_byte<T: Copy>(
    source_keys: &[u32],
    target_keys: &mut [u32],
    source_values: &[T],
    target_values: &mut [T],
    bucket_starts: &mut [usize; 256],
    shift: u32,
) {
    for (&key, &value) in source_keys.iter().zip(source_values) {
        let bucket = &mut bucket_starts[((key >> shift) & 0xFF) as usize];
        target_keys[*bucket] = key;
        target_values[*bucket] = value;
        *bucket += 1;
    }
}

/// Sorts `keys` ascending and applies the same permutation to `values`.
///
/// The scratch slices must have the same length as the inputs; their contents are overwritten.
/// The sort is stable, though the broad phase does not depend on that.
pub fn sort_u32<T: Copy>(
    keys: &mut [u32],
    values: &mut [T],
    keys_scratch: &mut [u32],
    values_scratch: &mut [T],
) {
    let key_count = keys.len();
    debug_assert!(
        values.len() == key_count
            && keys_scratch.len() == key_count
            && values_scratch.len() == key_count,
        "Radix sort inputs and scratch must all have the same length."
    );
    if key_count < 2 {
        return;
    }

    let mut bucket_counts = [[0usize; 256]; 4];
    for &key in keys.iter() {
        bucket_counts[0][(key & 0xFF) as usize] += 1;
        bucket_counts[1][((key >> 8) & 0xFF) as usize] += 1;
        bucket_counts[2][((key >> 16) & 0xFF) as usize] += 1;
        bucket_counts[3][(key >> 24) as usize] += 1;
    }

    // Exclusive partial sums turn counts into bucket start indices for each byte.
    for counts in bucket_counts.iter_mut() {
        let mut sum = 0;
        for count in counts.iter_mut() {
            let previous = *count;
            *count = sum;
            sum += previous;
        }
    }

    let [byte0, byte1, byte2, byte3] = &mut bucket_counts;
    reorder_for_byte(keys, keys_scratch, values, values_scratch, byte0, 0);
    reorder_for_byte(keys_scratch, keys, values_scratch, values, byte1, 8);
    reorder_for_byte(keys, keys_scratch, values, values_scratch, byte2, 16);
    reorder_for_byte(keys_scratch, keys, values_scratch, values, byte3, 24);
}
