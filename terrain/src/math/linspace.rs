use num_traits::{Float, FromPrimitive};

/// Returns `n` evenly spaced values from `y_start` to `y_end`,
/// inclusive.
///
/// A single value yields `y_start`.
pub fn linspace<T>(y_start: T, y_end: T, n: usize) -> impl Iterator<Item = T>
where
    T: Float + FromPrimitive,
{
    let dy = if n > 1 {
        (y_end - y_start) / T::from_usize(n - 1).unwrap_or_else(T::one)
    } else {
        T::zero()
    };
    (0..n).map(move |x| {
        if x + 1 == n && n > 1 {
            y_end
        } else {
            y_start + T::from_usize(x).unwrap_or_else(T::zero) * dy
        }
    })
}

#[cfg(test)]
mod tests {
    use super::linspace;

    #[test]
    fn test_linspace() {
        let v: Vec<f64> = linspace(0.0, 5.0, 6).collect();
        assert_eq!(v, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_linspace_degenerate() {
        assert_eq!(linspace(3.0, 7.0, 0).count(), 0);
        assert_eq!(linspace(3.0, 7.0, 1).collect::<Vec<f64>>(), vec![3.0]);
    }

    #[test]
    fn test_linspace_ends_exactly() {
        let last = linspace(0.0, 0.3, 4).last();
        assert_eq!(last, Some(0.3));
    }
}
