use crate::error::{CoreError, Result};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Resource name for CPU requests and capacity
pub const RESOURCE_CPU: &str = "cpu";
/// Resource name for memory requests and capacity
pub const RESOURCE_MEMORY: &str = "memory";
/// Extended resource name for NVIDIA accelerators
pub const RESOURCE_NVIDIA_GPU: &str = "nvidia.com/gpu";

/// Upper bound on significant digits accepted in a quantity string
const MAX_DIGITS: usize = 30;

/// Multi-dimensional resource quantity used for admission decisions.
///
/// Every dimension is an exact integer in its base unit. Arithmetic
/// saturates instead of wrapping and never clamps at zero, so an
/// over-committed node yields a negative free quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResourceQuantity {
    /// CPU in millicores (1000 = 1 core)
    pub cpu_millicores: i64,
    /// Memory in bytes
    pub memory_bytes: i64,
    /// Accelerator count
    pub gpu: i64,
}

impl ResourceQuantity {
    /// The zero quantity
    pub const ZERO: Self = Self {
        cpu_millicores: 0,
        memory_bytes: 0,
        gpu: 0,
    };

    pub fn new(cpu_millicores: i64, memory_bytes: i64, gpu: i64) -> Self {
        Self {
            cpu_millicores,
            memory_bytes,
            gpu,
        }
    }

    /// Component-wise in-place addition
    pub fn add(&mut self, other: &ResourceQuantity) {
        self.cpu_millicores = self.cpu_millicores.saturating_add(other.cpu_millicores);
        self.memory_bytes = self.memory_bytes.saturating_add(other.memory_bytes);
        self.gpu = self.gpu.saturating_add(other.gpu);
    }

    /// Component-wise in-place subtraction
    pub fn sub(&mut self, other: &ResourceQuantity) {
        self.cpu_millicores = self.cpu_millicores.saturating_sub(other.cpu_millicores);
        self.memory_bytes = self.memory_bytes.saturating_sub(other.memory_bytes);
        self.gpu = self.gpu.saturating_sub(other.gpu);
    }

    /// True iff `self` is at least `other` in every dimension
    pub fn accommodate(&self, other: &ResourceQuantity) -> bool {
        self.cpu_millicores >= other.cpu_millicores
            && self.memory_bytes >= other.memory_bytes
            && self.gpu >= other.gpu
    }

    /// True iff every dimension is strictly greater than zero
    pub fn positive(&self) -> bool {
        self.cpu_millicores > 0 && self.memory_bytes > 0 && self.gpu > 0
    }

    /// `accommodate` for a possibly absent quantity. Absent never accommodates.
    pub fn accommodates_opt(this: Option<&ResourceQuantity>, other: &ResourceQuantity) -> bool {
        this.is_some_and(|q| q.accommodate(other))
    }

    /// `positive` for a possibly absent quantity. Absent is never positive.
    pub fn positive_opt(this: Option<&ResourceQuantity>) -> bool {
        this.is_some_and(ResourceQuantity::positive)
    }

    /// Parse CPU string (e.g., "2", "1000m", "0.5") into millicores
    pub fn parse_cpu(s: &str) -> Result<i64> {
        parse_quantity_scaled(s, 1000)
    }

    /// Parse memory string (e.g., "128Mi", "1Gi", "1024") into bytes
    pub fn parse_memory(s: &str) -> Result<i64> {
        parse_quantity_scaled(s, 1)
    }

    /// Parse a plain count (e.g., "1", "4") such as an accelerator quantity
    pub fn parse_count(s: &str) -> Result<i64> {
        parse_quantity_scaled(s, 1)
    }

    /// Read CPU, memory and GPU from a resource map (k8s-openapi format).
    ///
    /// Missing entries count as zero. Unparseable entries are logged and
    /// also count as zero.
    pub fn from_k8s_resource_map(resources: &BTreeMap<String, Quantity>) -> Self {
        fn read(
            resources: &BTreeMap<String, Quantity>,
            name: &str,
            parse: fn(&str) -> Result<i64>,
        ) -> i64 {
            match resources.get(name) {
                Some(q) => parse(&q.0).unwrap_or_else(|e| {
                    warn!("Ignoring {} quantity: {}", name, e);
                    0
                }),
                None => 0,
            }
        }

        Self {
            cpu_millicores: read(resources, RESOURCE_CPU, Self::parse_cpu),
            memory_bytes: read(resources, RESOURCE_MEMORY, Self::parse_memory),
            gpu: read(resources, RESOURCE_NVIDIA_GPU, Self::parse_count),
        }
    }
}

impl fmt::Display for ResourceQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cpu={}m memory={} gpu={}",
            self.cpu_millicores, self.memory_bytes, self.gpu
        )
    }
}

/// Parse a Kubernetes quantity and express it in base units times `scale`.
///
/// Fractional results are rounded up in magnitude, matching how the API
/// server reports `Value()` and `MilliValue()`.
pub fn parse_quantity_scaled(value: &str, scale: i128) -> Result<i64> {
    let s = value.trim();
    if s.is_empty() {
        return Err(CoreError::invalid_quantity(value, "empty quantity"));
    }

    let (negative, unsigned) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    };

    let split = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(split);

    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(CoreError::invalid_quantity(value, "missing numeric value"));
    }
    if frac_part.contains('.') {
        return Err(CoreError::invalid_quantity(value, "more than one decimal point"));
    }
    if int_part.len() + frac_part.len() > MAX_DIGITS {
        return Err(CoreError::invalid_quantity(value, "too many digits"));
    }

    let mantissa = int_part
        .bytes()
        .chain(frac_part.bytes())
        .fold(0i128, |acc, b| acc * 10 + i128::from(b - b'0'));

    let (mul_num, mul_den) = exponent_multiplier(suffix)
        .or_else(|| suffix_multiplier(suffix))
        .ok_or_else(|| CoreError::invalid_quantity(value, format!("unknown suffix '{}'", suffix)))?;

    let out_of_range = || CoreError::invalid_quantity(value, "value out of range");

    let numerator = mantissa
        .checked_mul(mul_num)
        .and_then(|v| v.checked_mul(scale))
        .ok_or_else(out_of_range)?;
    let denominator = 10i128
        .checked_pow(frac_part.len() as u32)
        .and_then(|v| v.checked_mul(mul_den))
        .ok_or_else(out_of_range)?;

    let mut magnitude = numerator / denominator;
    if numerator % denominator != 0 {
        magnitude += 1;
    }

    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).map_err(|_| out_of_range())
}

/// Scientific notation suffix such as `e3` or `E-2`
fn exponent_multiplier(suffix: &str) -> Option<(i128, i128)> {
    let exp: i32 = suffix.strip_prefix(['e', 'E'])?.parse().ok()?;
    if exp.unsigned_abs() > 18 {
        return None;
    }
    let p = 10i128.pow(exp.unsigned_abs());
    Some(if exp >= 0 { (p, 1) } else { (1, p) })
}

/// Decimal SI and binary suffixes as a (numerator, denominator) pair
fn suffix_multiplier(suffix: &str) -> Option<(i128, i128)> {
    let multiplier: (i128, i128) = match suffix {
        "" => (1, 1),
        "n" => (1, 1_000_000_000),
        "u" => (1, 1_000_000),
        "m" => (1, 1_000),
        "k" => (1_000, 1),
        "M" => (1_000_000, 1),
        "G" => (1_000_000_000, 1),
        "T" => (1_000_000_000_000, 1),
        "P" => (1_000_000_000_000_000, 1),
        "E" => (1_000_000_000_000_000_000, 1),
        "Ki" => (1 << 10, 1),
        "Mi" => (1 << 20, 1),
        "Gi" => (1 << 30, 1),
        "Ti" => (1 << 40, 1),
        "Pi" => (1 << 50, 1),
        "Ei" => (1 << 60, 1),
        _ => return None,
    };
    Some(multiplier)
}
