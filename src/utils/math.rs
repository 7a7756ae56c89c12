use std::cmp::Ordering;

/// Partition data in-place using Lomuto scheme with a median-of-three pivot
fn partition_inplace(data: &mut [i64], low: usize, high: usize) -> usize {
    if low >= high {
        return low;
    }
    let mid = low + (high - low) / 2;
    let (a, b, c) = (data[low], data[mid], data[high]);
    let pivot_index = if (a <= b && b <= c) || (c <= b && b <= a) {
        mid
    } else if (b <= a && a <= c) || (c <= a && a <= b) {
        low
    } else {
        high
    };

    data.swap(pivot_index, high);
    let pivot_value = data[high];

    let mut i = low;
    for j in low..high {
        if data[j] <= pivot_value {
            data.swap(i, j);
            i += 1;
        }
    }
    data.swap(i, high);
    i
}

// Iterative quickselect; avoids the quadratic worst case on sorted input
fn select_inplace(data: &mut [i64], k: usize) -> Option<i64> {
    if data.is_empty() || k >= data.len() {
        return None;
    }

    let mut low = 0;
    let mut high = data.len() - 1;

    loop {
        if low == high {
            return if low == k { Some(data[low]) } else { None };
        }
        let pivot_index = partition_inplace(data, low, high);
        match pivot_index.cmp(&k) {
            Ordering::Equal => return Some(data[k]),
            Ordering::Greater => {
                if pivot_index == 0 {
                    return None;
                }
                high = pivot_index - 1;
            }
            Ordering::Less => {
                low = pivot_index + 1;
            }
        }
        if low > high {
            return None;
        }
    }
}

pub fn median(data: &[i64]) -> Option<f64> {
    let size = data.len();
    if size == 0 {
        return None;
    }
    let mut data_copy = data.to_vec();
    if size % 2 == 0 {
        let k1 = (size / 2) - 1;
        let fst = select_inplace(&mut data_copy, k1)?;
        let snd = *data_copy[size / 2..].iter().min()?;
        Some((fst + snd) as f64 / 2.0)
    } else {
        select_inplace(&mut data_copy, size / 2).map(|x| x as f64)
    }
}

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_median_single_element() {
        assert_eq!(median(&[5]), Some(5.0));
    }

    #[test]
    fn test_median_odd_count_unsorted() {
        assert_eq!(median(&[3, 1, 4, 1, 5]), Some(3.0));
    }

    #[test]
    fn test_median_even_count_unsorted() {
        assert_eq!(median(&[3, 1, 4, 2]), Some(2.5));
    }

    #[test]
    fn test_median_with_duplicates() {
        assert_eq!(median(&[1, 2, 2, 3]), Some(2.0));
        assert_eq!(median(&[1, 2, 2, 2, 3]), Some(2.0));
    }

    #[test]
    fn test_median_reverse_sorted() {
        assert_eq!(median(&[5, 4, 3, 2, 1]), Some(3.0));
        assert_eq!(median(&[4, 3, 2, 1]), Some(2.5));
    }

    #[test]
    fn test_median_large() {
        let data: Vec<i64> = (1..=1000).rev().collect();
        assert_eq!(median(&data), Some(500.5));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
    }
}
