//! Extremum helpers with first-wins tie breaking.

use crate::error::{LunchError, Result};

/// Element with the largest key. Ties keep the earliest element.
///
/// # Errors
///
/// Returns [`LunchError::EmptyExtremum`] for an empty input.
pub fn max_by_key<T, I, F>(items: I, mut key: F) -> Result<T>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> f64,
{
    let mut iter = items.into_iter();
    let first = iter.next().ok_or(LunchError::EmptyExtremum("max_by_key"))?;
    let mut best_value = key(&first);
    let mut best = first;
    for item in iter {
        let value = key(&item);
        if value > best_value {
            best_value = value;
            best = item;
        }
    }
    Ok(best)
}

/// Element with the smallest key. Ties keep the earliest element.
///
/// # Errors
///
/// Returns [`LunchError::EmptyExtremum`] for an empty input.
pub fn min_by_key<T, I, F>(items: I, mut key: F) -> Result<T>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> f64,
{
    max_by_key(items, |item| -key(item)).map_err(|_| LunchError::EmptyExtremum("min_by_key"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_keeps_first_on_tie() {
        let items = [(0, 1.0), (1, 3.0), (2, 3.0)];
        let (idx, _) = max_by_key(items, |(_, v)| *v).expect("non-empty");
        assert_eq!(idx, 1);
    }

    #[test]
    fn min_keeps_first_on_tie() {
        let items = [(0, 2.0), (1, 1.0), (2, 1.0)];
        let (idx, _) = min_by_key(items, |(_, v)| *v).expect("non-empty");
        assert_eq!(idx, 1);
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = max_by_key(Vec::<f64>::new(), |v| *v).unwrap_err();
        assert!(matches!(err, LunchError::EmptyExtremum(_)));
        let err = min_by_key(Vec::<f64>::new(), |v| *v).unwrap_err();
        assert!(matches!(err, LunchError::EmptyExtremum("min_by_key")));
    }
}
