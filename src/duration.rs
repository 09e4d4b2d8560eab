//! Tick count <-> MML note length conversion
//!
//! A length token is a chain of components joined by `^` (tie). Each
//! component is either a note value (`4` = quarter, `8` = eighth, `3` =
//! half-note triplet ...) optionally followed by dots, or `=n` for an
//! explicit tick count.

/// Tie marker between length components
pub const TIE: char = '^';

/// Prefix of an explicit tick count component
pub const EXPLICIT_TICKS: char = '=';

/// All tick counts a single length component can stand for.
///
/// These are the divisors of a whole note (`4 * ppq` ticks). Divisors that
/// are multiples of 3 come first so triplet values are preferred, each half
/// sorted from the longest to the shortest.
#[derive(Debug, Clone)]
pub struct DurationGrid {
    whole: u32,
    divisors: Vec<u32>,
}

impl DurationGrid {
    pub fn new(ppq: u32) -> Self {
        let whole = 4 * ppq;
        let (mut divisors, plain): (Vec<u32>, Vec<u32>) = (1..=whole)
            .rev()
            .filter(|d| whole % d == 0)
            .partition(|d| d % 3 == 0);
        divisors.extend(plain);
        Self { whole, divisors }
    }

    pub fn divisors(&self) -> &[u32] {
        &self.divisors
    }

    /// Encode a tick count as a tie-chained length token.
    ///
    /// Zero ticks has no note value and is written as `=0`.
    pub fn encode(&self, ticks: u32) -> String {
        if ticks == 0 || self.whole == 0 {
            return format!("{}{}", EXPLICIT_TICKS, ticks);
        }

        let mut rest = ticks;
        let mut parts: Vec<String> = Vec::new();
        for &d in &self.divisors {
            let factor = rest / d;
            for _ in 0..factor {
                parts.push((self.whole / d).to_string());
            }
            rest %= d;
        }
        debug_assert_eq!(rest, 0, "grid contains 1, nothing can be left over");

        parts.join(&TIE.to_string())
    }

    /// Decode a length token into ticks.
    ///
    /// An empty, zero or unreadable component makes the whole token a full
    /// note, as does a tie chain whose exact sum does not fit in `u128`.
    pub fn decode(&self, value: &str) -> u32 {
        let mut sum = Fraction::ZERO;

        for component in value.split(TIE) {
            let digits_end = component.trim_end_matches('.').len();
            let dots = component.len() - digits_end;
            let body = &component[..digits_end];

            if let Some(explicit) = body.strip_prefix(EXPLICIT_TICKS) {
                let Ok(ticks) = explicit.parse::<u64>() else {
                    return self.fallback(value);
                };
                // each dot adds half of the previous addend
                let mut addend = ticks;
                let Some(total) = sum.checked_add(Fraction::new(addend as u128, 1)) else {
                    return self.fallback(value);
                };
                sum = total;
                for _ in 0..dots {
                    addend /= 2;
                    match sum.checked_add(Fraction::new(addend as u128, 1)) {
                        Some(total) => sum = total,
                        None => break,
                    }
                }
                continue;
            }

            let value_num = match body.parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => return self.fallback(value),
            };
            // each dot ties on a note of twice the previous denominator
            let mut denominator = value_num as u128;
            let Some(total) = sum.checked_add(Fraction::new(self.whole as u128, denominator))
            else {
                return self.fallback(value);
            };
            sum = total;
            // dots stop once the sum can no longer be held exactly
            for _ in 0..dots {
                let Some(next) = denominator.checked_mul(2) else {
                    break;
                };
                denominator = next;
                match sum.checked_add(Fraction::new(self.whole as u128, denominator)) {
                    Some(total) => sum = total,
                    None => break,
                }
            }
        }

        u32::try_from(sum.floor()).unwrap_or(u32::MAX)
    }

    fn fallback(&self, value: &str) -> u32 {
        log::debug!("length '{}' defaults to a full note ({} ticks)", value, self.whole);
        self.whole
    }
}

/// Encode `ticks` as an MML length token for the given PPQ
pub fn ticks_to_value(ticks: u32, ppq: u32) -> String {
    DurationGrid::new(ppq).encode(ticks)
}

/// Decode an MML length token into ticks for the given PPQ
pub fn value_to_ticks(value: &str, ppq: u32) -> u32 {
    DurationGrid::new(ppq).decode(value)
}

/// Exact sum of note values, so `3^3^3` is a whole note and not one tick short
#[derive(Debug, Clone, Copy)]
struct Fraction {
    num: u128,
    den: u128,
}

impl Fraction {
    const ZERO: Fraction = Fraction { num: 0, den: 1 };

    fn new(num: u128, den: u128) -> Self {
        Self { num, den }
    }

    /// Reduced sum, or `None` if an intermediate product leaves `u128`
    fn checked_add(self, other: Fraction) -> Option<Fraction> {
        let num = self
            .num
            .checked_mul(other.den)?
            .checked_add(other.num.checked_mul(self.den)?)?;
        let den = self.den.checked_mul(other.den)?;
        let g = gcd(num, den).max(1);
        Some(Fraction {
            num: num / g,
            den: den / g,
        })
    }

    fn floor(self) -> u128 {
        self.num / self.den
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
