use std::{
  cmp::Ordering,
  fmt,
  ops::{Add, AddAssign, Div, Mul, Sub, SubAssign},
};

/// Time position or length in MIDI ticks, relative to the file division.
#[derive(Debug, Eq, Copy, Clone, Hash, Default)]
pub struct Ticks(i32);

impl Ticks {
  /// End of time, used as the open end of spans and as the time of the end position.
  pub const MAX: Ticks = Ticks(i32::max_value());

  pub fn new(ticks: i32) -> Ticks {
    Ticks(ticks)
  }

  pub fn zero() -> Ticks {
    Ticks(0)
  }

  pub fn value(self) -> i32 {
    self.0
  }
}

impl Ord for Ticks {
  fn cmp(&self, other: &Ticks) -> Ordering {
    self.0.cmp(&other.0)
  }
}

impl PartialOrd for Ticks {
  fn partial_cmp(&self, other: &Ticks) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for Ticks {
  fn eq(&self, other: &Ticks) -> bool {
    self.0 == other.0
  }
}

impl Add for Ticks {
  type Output = Ticks;
  fn add(self, rhs: Ticks) -> Self {
    Ticks::new(self.0.saturating_add(rhs.0))
  }
}

impl AddAssign for Ticks {
  fn add_assign(&mut self, rhs: Ticks) {
    *self = *self + rhs;
  }
}

impl Sub for Ticks {
  type Output = Ticks;
  fn sub(self, rhs: Ticks) -> Self {
    Ticks::new(self.0.saturating_sub(rhs.0))
  }
}

impl SubAssign for Ticks {
  fn sub_assign(&mut self, rhs: Ticks) {
    *self = *self - rhs;
  }
}

impl Mul<i32> for Ticks {
  type Output = Ticks;
  fn mul(self, rhs: i32) -> Self {
    Ticks::new(self.0.saturating_mul(rhs))
  }
}

/// Number of whole `rhs` spans in `self`.
impl Div for Ticks {
  type Output = i32;
  fn div(self, rhs: Ticks) -> i32 {
    self.0 / rhs.0
  }
}

impl Div<i32> for Ticks {
  type Output = Ticks;
  fn div(self, rhs: i32) -> Self {
    Ticks::new(self.0 / rhs)
  }
}

impl From<i32> for Ticks {
  fn from(item: i32) -> Self {
    Ticks(item)
  }
}

impl From<Ticks> for i32 {
  fn from(item: Ticks) -> Self {
    item.0
  }
}

impl fmt::Display for Ticks {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if *self == Ticks::MAX {
      write!(f, "end")
    } else {
      write!(f, "{}", self.0)
    }
  }
}

#[cfg(test)]
mod test {

  use super::Ticks;
  use std::cmp::Ordering;

  #[test]
  pub fn new() {
    let ticks = Ticks::new(1234);
    assert_eq!(ticks.0, 1234);
    assert_eq!(ticks.value(), 1234);
  }

  #[test]
  pub fn zero() {
    assert_eq!(Ticks::zero().0, 0);
    assert_eq!(Ticks::default(), Ticks::zero());
  }

  #[test]
  pub fn ord_cmp() {
    let time1 = Ticks::new(-5);
    let time2 = Ticks::new(1235);
    assert_eq!(time1.cmp(&time2), Ordering::Less);
    assert_eq!(time2.cmp(&time1), Ordering::Greater);
    assert_eq!(time1.cmp(&time1), Ordering::Equal);
    assert!(time2 < Ticks::MAX);
  }

  #[test]
  pub fn add_saturates() {
    assert_eq!(Ticks::new(100) + Ticks::new(50), Ticks(150));
    assert_eq!(Ticks::MAX + Ticks::new(1), Ticks::MAX);
  }

  #[test]
  pub fn sub() {
    let mut time = Ticks::new(100);
    time -= Ticks::new(130);
    assert_eq!(time, Ticks(-30));
  }

  #[test]
  pub fn mul_div() {
    assert_eq!(Ticks::new(240) * 4, Ticks(960));
    assert_eq!(Ticks::new(960) / 4, Ticks(240));
    assert_eq!(Ticks::new(1000) / Ticks::new(240), 4);
  }

  #[test]
  pub fn display() {
    assert_eq!(Ticks::new(42).to_string(), "42");
    assert_eq!(Ticks::MAX.to_string(), "end");
  }
}
