use gradtrack_core::num_traits::ToPrimitive;
use gradtrack_core::GradTrackError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Order `p` of the vector norm `(sum |x|^p)^(1/p)`, or the max-abs norm.
///
/// Constructed values are never NaN, never zero and never negative, which is
/// what makes the manual `Eq`/`Ord`/`Hash` impls sound.
#[derive(Debug, Clone, Copy)]
pub enum NormOrder {
    Finite(f64),
    Infinity,
}

impl NormOrder {
    pub fn new(p: f64) -> Result<Self, GradTrackError> {
        if p.is_nan() || p <= 0.0 {
            return Err(GradTrackError::InvalidNormOrder {
                order: p.to_string(),
            });
        }
        if p.is_infinite() {
            return Ok(NormOrder::Infinity);
        }
        Ok(NormOrder::Finite(p))
    }

    pub fn l2() -> Self {
        NormOrder::Finite(2.0)
    }

    fn sort_key(&self) -> f64 {
        match self {
            NormOrder::Finite(p) => *p,
            NormOrder::Infinity => f64::INFINITY,
        }
    }

    /// Norm of a flattened vector. An empty vector has norm `0.0`.
    pub fn norm<T: ToPrimitive + Copy>(&self, values: &[T]) -> f64 {
        vector_norm(values, *self)
    }

    /// Norm of the concatenation of vectors whose individual norms are `parts`.
    pub fn combine(&self, parts: impl IntoIterator<Item = f64>) -> f64 {
        match self {
            NormOrder::Infinity => parts.into_iter().fold(0.0, nan_max),
            NormOrder::Finite(p) => {
                let p = *p;
                if p == 1.0 {
                    parts.into_iter().sum()
                } else if p == 2.0 {
                    parts.into_iter().map(|n| n * n).sum::<f64>().sqrt()
                } else {
                    parts
                        .into_iter()
                        .map(|n| n.powf(p))
                        .sum::<f64>()
                        .powf(1.0 / p)
                }
            }
        }
    }
}

// f64::max drops NaN; a NaN gradient must show up in the logged norm.
fn nan_max(acc: f64, value: f64) -> f64 {
    if acc.is_nan() || value.is_nan() {
        f64::NAN
    } else {
        acc.max(value)
    }
}

/// Computes `norm_p(values)` in f64, whatever the element type.
pub fn vector_norm<T: ToPrimitive + Copy>(values: &[T], order: NormOrder) -> f64 {
    let abs = values
        .iter()
        .map(|v| v.to_f64().unwrap_or(f64::NAN).abs());
    match order {
        NormOrder::Infinity => abs.fold(0.0, nan_max),
        NormOrder::Finite(p) if p == 1.0 => abs.sum(),
        NormOrder::Finite(p) if p == 2.0 => abs.map(|a| a * a).sum::<f64>().sqrt(),
        NormOrder::Finite(p) => abs.map(|a| a.powf(p)).sum::<f64>().powf(1.0 / p),
    }
}

impl Default for NormOrder {
    fn default() -> Self {
        NormOrder::l2()
    }
}

impl PartialEq for NormOrder {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NormOrder {}

impl PartialOrd for NormOrder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NormOrder {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().total_cmp(&other.sort_key())
    }
}

impl Hash for NormOrder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().to_bits().hash(state);
    }
}

/// Renders like a float literal: `2.0`, `1.5`, `inf`.
impl fmt::Display for NormOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormOrder::Infinity => write!(f, "inf"),
            NormOrder::Finite(p) if p.fract() == 0.0 && p.abs() < 1e16 => write!(f, "{:.1}", p),
            NormOrder::Finite(p) => write!(f, "{}", p),
        }
    }
}

impl FromStr for NormOrder {
    type Err = GradTrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "inf" | "infinity" => Ok(NormOrder::Infinity),
            _ => {
                let p: f64 = trimmed.parse().map_err(|_| GradTrackError::InvalidNormOrder {
                    order: s.to_string(),
                })?;
                NormOrder::new(p)
            }
        }
    }
}

impl TryFrom<f64> for NormOrder {
    type Error = GradTrackError;

    fn try_from(p: f64) -> Result<Self, Self::Error> {
        NormOrder::new(p)
    }
}
