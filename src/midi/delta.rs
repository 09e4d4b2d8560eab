//! Delta time encoding

/// Turn sorted absolute ticks into gaps; the first gap is measured from 0
pub fn to_deltas(ticks: &[u32]) -> Vec<u32> {
    let mut previous = 0u32;
    ticks
        .iter()
        .map(|&tick| {
            let delta = tick.saturating_sub(previous);
            previous = tick;
            delta
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_delta_is_absolute() {
        assert_eq!(to_deltas(&[24, 48, 48, 96]), vec![24, 24, 0, 48]);
    }

    #[test]
    fn test_empty() {
        assert!(to_deltas(&[]).is_empty());
    }
}
