// src/either.rs

//! A two-way routing value used by [`Sink::choose`](crate::Sink::choose).

/// One of two values. Neither side implies failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Either<L, R> {
  Left(L),
  Right(R),
}

impl<L, R> Either<L, R> {
  #[inline]
  pub fn is_left(&self) -> bool {
    matches!(self, Either::Left(_))
  }

  #[inline]
  pub fn is_right(&self) -> bool {
    matches!(self, Either::Right(_))
  }

  /// Collapses both sides into one value.
  pub fn either<T>(self, on_left: impl FnOnce(L) -> T, on_right: impl FnOnce(R) -> T) -> T {
    match self {
      Either::Left(left) => on_left(left),
      Either::Right(right) => on_right(right),
    }
  }
}

impl<T> Either<T, T> {
  /// The contained value, whichever side holds it.
  pub fn into_inner(self) -> T {
    match self {
      Either::Left(value) | Either::Right(value) => value,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn either_folds_each_side() {
    let left: Either<i32, &str> = Either::Left(2);
    let right: Either<i32, &str> = Either::Right("abc");
    assert!(left.is_left() && right.is_right());
    assert_eq!(left.either(|n| n as usize * 10, str::len), 20usize);
    assert_eq!(right.either(|n| n as usize, str::len), 3);
    assert_eq!(Either::<u8, u8>::Right(4).into_inner(), 4);
  }
}
