//! Physical units as a closed identifier set.
//!
//! Units form a finite set closed under multiplication and division via a
//! static lookup table. There is no conversion machinery; equality is
//! identifier equality and unknown products fail with
//! [`Error::UnitArithmetic`].

use crate::error::{Error, Result};

/// Unit identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Unit {
    #[default]
    Dimensionless,
    Length,
    Area,
    Volume,
    Counts,
    CountsTimesLength,
    InverseLength,
    Time,
}

impl Unit {
    /// Product of two units.
    pub fn multiply(self, other: Unit) -> Result<Unit> {
        use Unit::*;
        match (self, other) {
            (Dimensionless, u) | (u, Dimensionless) => Ok(u),
            (Length, Length) => Ok(Area),
            (Length, Area) | (Area, Length) => Ok(Volume),
            (Counts, Length) | (Length, Counts) => Ok(CountsTimesLength),
            (InverseLength, Length) | (Length, InverseLength) => Ok(Dimensionless),
            (left, right) => Err(Error::UnitArithmetic {
                left,
                right,
                op: "*",
            }),
        }
    }

    /// Quotient of two units.
    pub fn divide(self, other: Unit) -> Result<Unit> {
        use Unit::*;
        match (self, other) {
            (u, Dimensionless) => Ok(u),
            (a, b) if a == b => Ok(Dimensionless),
            (Area, Length) => Ok(Length),
            (Volume, Length) => Ok(Area),
            (Volume, Area) => Ok(Length),
            (CountsTimesLength, Length) => Ok(Counts),
            (CountsTimesLength, Counts) => Ok(Length),
            (Dimensionless, Length) => Ok(InverseLength),
            (left, right) => Err(Error::UnitArithmetic {
                left,
                right,
                op: "/",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensionless_is_identity() {
        assert_eq!(
            Unit::Length.multiply(Unit::Dimensionless).unwrap(),
            Unit::Length
        );
        assert_eq!(
            Unit::Dimensionless.multiply(Unit::Counts).unwrap(),
            Unit::Counts
        );
        assert_eq!(
            Unit::Counts.divide(Unit::Dimensionless).unwrap(),
            Unit::Counts
        );
    }

    #[test]
    fn length_squared_is_area() {
        assert_eq!(Unit::Length.multiply(Unit::Length).unwrap(), Unit::Area);
        assert_eq!(Unit::Area.multiply(Unit::Length).unwrap(), Unit::Volume);
    }

    #[test]
    fn division_inverts_multiplication() {
        assert_eq!(Unit::Area.divide(Unit::Length).unwrap(), Unit::Length);
        assert_eq!(Unit::Volume.divide(Unit::Area).unwrap(), Unit::Length);
        assert_eq!(
            Unit::CountsTimesLength.divide(Unit::Counts).unwrap(),
            Unit::Length
        );
    }

    #[test]
    fn self_division_is_dimensionless() {
        assert_eq!(Unit::Time.divide(Unit::Time).unwrap(), Unit::Dimensionless);
    }

    #[test]
    fn unknown_product_fails() {
        let err = Unit::Time.multiply(Unit::Counts).unwrap_err();
        assert!(matches!(
            err,
            Error::UnitArithmetic {
                left: Unit::Time,
                right: Unit::Counts,
                op: "*",
            }
        ));
    }

    #[test]
    fn unknown_quotient_fails() {
        assert!(Unit::Counts.divide(Unit::Time).is_err());
        assert!(Unit::Area.divide(Unit::Volume).is_err());
    }
}
