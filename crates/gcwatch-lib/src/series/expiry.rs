//! Eviction policies for time series
//!
//! A policy is a pure predicate deciding whether one sample should be
//! dropped, given the complete series as it stood when the eviction pass
//! started. Policies may also report a lower bound of samples they always
//! retain, which detectors use to check they can ever see enough data.

use crate::error::ConfigError;
use crate::models::Sample;
use chrono::{DateTime, Utc};
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Inputs for a single expiry decision
pub struct ExpiryParams<'a, T> {
    sample: &'a Sample<T>,
    position: usize,
    all: &'a [Sample<T>],
    now: DateTime<Utc>,
}

impl<'a, T> ExpiryParams<'a, T> {
    pub(crate) fn new(
        sample: &'a Sample<T>,
        position: usize,
        all: &'a [Sample<T>],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            sample,
            position,
            all,
            now,
        }
    }

    /// The sample being inspected
    pub fn sample(&self) -> &Sample<T> {
        self.sample
    }

    /// Position of the sample in [`Self::all`], 0 being the newest
    pub fn position(&self) -> usize {
        self.position
    }

    /// The series as it stood when the eviction pass started, newest first
    pub fn all(&self) -> &[Sample<T>] {
        self.all
    }

    /// Wall clock instant captured once for the whole pass
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// Eviction policy for a [`super::TimeSeries`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// Keep at most this many of the newest samples
    Capacity(NonZeroUsize),
    /// Drop samples that are at least this old (the boundary itself expires)
    Age(Duration),
    /// Never drop anything.
    ///
    /// The series grows without bound; only meant for diagnostics.
    Never,
    /// Expired only if both policies agree
    And(Box<Expiry>, Box<Expiry>),
    /// Expired if either policy says so
    Or(Box<Expiry>, Box<Expiry>),
    Not(Box<Expiry>),
}

impl Expiry {
    /// Keep at most `max_samples` newest samples
    pub fn capacity(max_samples: usize) -> Result<Self, ConfigError> {
        NonZeroUsize::new(max_samples)
            .map(Expiry::Capacity)
            .ok_or(ConfigError::InvalidCapacity(max_samples))
    }

    /// Expire samples older than `now - max_age`
    pub fn age(max_age: Duration) -> Self {
        Expiry::Age(max_age)
    }

    pub fn never() -> Self {
        Expiry::Never
    }

    pub fn and(self, other: Expiry) -> Self {
        Expiry::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expiry) -> Self {
        Expiry::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Expiry::Not(Box::new(self))
    }

    /// Decide whether the inspected sample must be removed
    pub fn is_expired<T>(&self, params: &ExpiryParams<'_, T>) -> bool {
        match self {
            Expiry::Capacity(max) => params.position() >= max.get(),
            Expiry::Age(max_age) => {
                let Ok(max_age) = chrono::Duration::from_std(*max_age) else {
                    // Older than anything representable
                    return false;
                };
                match params.now().checked_sub_signed(max_age) {
                    Some(expire_at) => params.sample().timestamp() <= expire_at,
                    None => false,
                }
            }
            Expiry::Never => false,
            Expiry::And(a, b) => a.is_expired(params) && b.is_expired(params),
            Expiry::Or(a, b) => a.is_expired(params) || b.is_expired(params),
            Expiry::Not(inner) => !inner.is_expired(params),
        }
    }

    /// Lower bound of samples retained after an eviction pass, if known
    pub fn expected_readings(&self) -> Option<usize> {
        match self {
            Expiry::Capacity(max) => Some(max.get()),
            Expiry::And(a, b) => a
                .expected_readings()
                .zip(b.expected_readings())
                .map(|(a, b)| a.min(b)),
            Expiry::Age(_) | Expiry::Never | Expiry::Or(..) | Expiry::Not(_) => None,
        }
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::Capacity(max) => write!(f, "capacity({})", max),
            Expiry::Age(max_age) => write!(f, "age({}s)", max_age.as_secs_f64()),
            Expiry::Never => write!(f, "never"),
            Expiry::And(a, b) => write!(f, "({} and {})", a, b),
            Expiry::Or(a, b) => write!(f, "({} or {})", a, b),
            Expiry::Not(inner) => write!(f, "not({})", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, d, 0, 0, 0).unwrap()
    }

    /// Evaluate `expiry` for every entry of `all` and return the verdicts
    fn decisions(expiry: &Expiry, all: &[Sample<&str>], now: DateTime<Utc>) -> Vec<bool> {
        all.iter()
            .enumerate()
            .map(|(i, s)| expiry.is_expired(&ExpiryParams::new(s, i, all, now)))
            .collect()
    }

    fn three() -> Vec<Sample<&'static str>> {
        vec![
            Sample::new(day(3), "third"),
            Sample::new(day(2), "second"),
            Sample::new(day(1), "first"),
        ]
    }

    #[test]
    fn test_capacity_rejects_zero() {
        assert_eq!(Expiry::capacity(0), Err(ConfigError::InvalidCapacity(0)));
        assert!(Expiry::capacity(1).is_ok());
    }

    #[test]
    fn test_capacity_expires_oldest() {
        let expiry = Expiry::capacity(2).unwrap();
        assert_eq!(decisions(&expiry, &three(), day(10)), vec![false, false, true]);
    }

    #[test]
    fn test_capacity_keeps_small_series() {
        let expiry = Expiry::capacity(2).unwrap();
        let series = three();
        let all = &series[..2];
        assert_eq!(decisions(&expiry, all, day(10)), vec![false, false]);
    }

    #[test]
    fn test_capacity_expected_readings() {
        assert_eq!(Expiry::capacity(2).unwrap().expected_readings(), Some(2));
        assert_eq!(
            Expiry::capacity(usize::MAX).unwrap().expected_readings(),
            Some(usize::MAX)
        );
    }

    #[test]
    fn test_age_boundary_is_expired() {
        let expiry = Expiry::age(Duration::from_secs(24 * 60 * 60));
        let now = day(10);

        let on_boundary = [Sample::new(day(9), "boundary")];
        assert_eq!(decisions(&expiry, &on_boundary, now), vec![true]);

        let just_younger = [Sample::new(day(9) + chrono::Duration::nanoseconds(1), "young")];
        assert_eq!(decisions(&expiry, &just_younger, now), vec![false]);
    }

    #[test]
    fn test_age_old_now_and_future() {
        let expiry = Expiry::age(Duration::from_secs(24 * 60 * 60));
        let all = [
            Sample::new(day(15), "future"),
            Sample::new(day(10), "now"),
            Sample::new(day(5), "very old"),
        ];
        assert_eq!(decisions(&expiry, &all, day(10)), vec![false, false, true]);
    }

    #[test]
    fn test_age_beyond_representable_never_expires() {
        let expiry = Expiry::age(Duration::from_secs(u64::MAX));
        assert_eq!(decisions(&expiry, &three(), day(10)), vec![false, false, false]);
        assert_eq!(expiry.expected_readings(), None);
    }

    #[test]
    fn test_never_expires_nothing() {
        assert_eq!(
            decisions(&Expiry::never(), &three(), day(10)),
            vec![false, false, false]
        );
        assert_eq!(Expiry::never().expected_readings(), None);
    }

    #[test]
    fn test_boolean_combinators() {
        let t = Expiry::never().negate();
        let f = Expiry::never();
        let series = three();
        let all = &series[..1];
        let now = day(10);
        let eval = |e: &Expiry| decisions(e, all, now)[0];

        assert!(eval(&t.clone().and(t.clone())));
        assert!(!eval(&t.clone().and(f.clone())));
        assert!(!eval(&f.clone().and(t.clone())));
        assert!(!eval(&f.clone().and(f.clone())));

        assert!(eval(&t.clone().or(t.clone())));
        assert!(eval(&t.clone().or(f.clone())));
        assert!(eval(&f.clone().or(t.clone())));
        assert!(!eval(&f.clone().or(f.clone())));

        assert!(!eval(&t.clone().negate()));
        assert!(eval(&f.negate()));
    }

    #[test]
    fn test_boolean_algebra_over_frozen_context() {
        let all = three();
        let now = day(3);
        let policies = [
            Expiry::capacity(1).unwrap(),
            Expiry::capacity(2).unwrap(),
            Expiry::age(Duration::from_secs(24 * 60 * 60)),
            Expiry::never(),
        ];

        for p in &policies {
            let plain = decisions(p, &all, now);
            assert_eq!(decisions(&p.clone().and(p.clone()), &all, now), plain);
            assert_eq!(decisions(&p.clone().or(p.clone()), &all, now), plain);
            assert_eq!(decisions(&p.clone().negate().negate(), &all, now), plain);
            assert!(decisions(&p.clone().or(p.clone().negate()), &all, now)
                .iter()
                .all(|expired| *expired));
            assert!(decisions(&p.clone().and(p.clone().negate()), &all, now)
                .iter()
                .all(|expired| !*expired));
        }
    }

    #[test]
    fn test_composite_expected_readings() {
        let two = Expiry::capacity(2).unwrap();
        let five = Expiry::capacity(5).unwrap();
        let age = Expiry::age(Duration::from_secs(60));

        assert_eq!(two.clone().and(five.clone()).expected_readings(), Some(2));
        assert_eq!(two.clone().and(age.clone()).expected_readings(), None);
        assert_eq!(two.clone().or(five).expected_readings(), None);
        assert_eq!(two.negate().expected_readings(), None);
    }

    #[test]
    fn test_display() {
        let expiry = Expiry::capacity(3)
            .unwrap()
            .or(Expiry::age(Duration::from_secs(60)).negate());
        assert_eq!(expiry.to_string(), "(capacity(3) or not(age(60s)))");
    }
}
