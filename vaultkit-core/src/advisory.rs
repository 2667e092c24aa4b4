//! Device security advisory seam.
//!
//! Platforms report whether the device looks compromised (rooted, jailbroken,
//! debugger attached). The vault treats the verdict as advisory input for the
//! UI, never as a hard gate: a probe failure degrades to
//! [`SecurityVerdict::Inconclusive`] instead of blocking the user out of
//! their own data.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::VaultResult;
use crate::types::now;

/// How long a cached assessment stays valid.
pub const ADVISORY_CACHE_TTL: Duration = Duration::from_secs(60);

/// Overall device security verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SecurityVerdict {
    /// No signs of compromise detected.
    Secure,
    /// At least one compromise signal was detected.
    Insecure,
    /// The probe could not run or could not decide.
    Inconclusive,
}

/// A device security assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityAssessment {
    /// Overall verdict.
    pub verdict: SecurityVerdict,
    /// Human-readable descriptions of detected threats, empty when secure.
    pub threats: Vec<String>,
    /// When the assessment was taken (unix seconds).
    pub checked_at: u64,
}

impl SecurityAssessment {
    /// An assessment with no detected threats.
    #[must_use]
    pub fn secure() -> Self {
        Self {
            verdict: SecurityVerdict::Secure,
            threats: Vec::new(),
            checked_at: now(),
        }
    }

    /// An inconclusive assessment, used when the platform probe fails.
    #[must_use]
    pub fn inconclusive() -> Self {
        Self {
            verdict: SecurityVerdict::Inconclusive,
            threats: Vec::new(),
            checked_at: now(),
        }
    }
}

/// Platform probe for device compromise signals.
pub trait DeviceSecurityAdvisory: Send + Sync {
    /// Runs the platform checks and returns an assessment.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe itself cannot run; callers going
    /// through [`CachedAdvisory`] see this as an inconclusive verdict.
    fn assess(&self) -> VaultResult<SecurityAssessment>;
}

/// TTL cache over a [`DeviceSecurityAdvisory`].
///
/// Probes can be expensive (filesystem scans, syscall checks), so repeated
/// lookups within the TTL return the cached assessment. Probe failures are
/// logged, reported as inconclusive, and never cached, so the next lookup
/// retries.
pub struct CachedAdvisory {
    inner: Arc<dyn DeviceSecurityAdvisory>,
    ttl: Duration,
    cached: Mutex<Option<(SecurityAssessment, Instant)>>,
}

impl CachedAdvisory {
    /// Wraps an advisory with the given cache TTL.
    #[must_use]
    pub fn new(inner: Arc<dyn DeviceSecurityAdvisory>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Returns the current assessment, probing when the cache is empty or
    /// stale.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex was poisoned by a panicking thread.
    pub fn assess(&self) -> SecurityAssessment {
        let mut guard = self.cached.lock().expect("advisory cache poisoned");
        if let Some((assessment, probed_at)) = guard.as_ref() {
            if probed_at.elapsed() < self.ttl {
                return assessment.clone();
            }
        }
        match self.inner.assess() {
            Ok(assessment) => {
                *guard = Some((assessment.clone(), Instant::now()));
                assessment
            }
            Err(err) => {
                tracing::warn!(%err, "device security probe failed");
                SecurityAssessment::inconclusive()
            }
        }
    }

    /// Drops any cached assessment so the next lookup probes again.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex was poisoned by a panicking thread.
    pub fn invalidate(&self) {
        *self.cached.lock().expect("advisory cache poisoned") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::StaticAdvisory;

    #[test]
    fn cached_within_ttl() {
        let advisory = StaticAdvisory::secure();
        let cached = CachedAdvisory::new(Arc::new(advisory), Duration::from_secs(60));

        assert_eq!(cached.assess().verdict, SecurityVerdict::Secure);
        assert_eq!(cached.assess().verdict, SecurityVerdict::Secure);
    }

    #[test]
    fn probe_failure_is_inconclusive_and_uncached() {
        let advisory = Arc::new(StaticAdvisory::failing());
        let cached = CachedAdvisory::new(
            Arc::clone(&advisory) as Arc<dyn DeviceSecurityAdvisory>,
            Duration::from_secs(60),
        );

        assert_eq!(cached.assess().verdict, SecurityVerdict::Inconclusive);
        // The failure was not cached; a now-working probe is consulted again.
        advisory.set_threats(Vec::new());
        assert_eq!(cached.assess().verdict, SecurityVerdict::Secure);
    }

    #[test]
    fn invalidate_forces_reprobe() {
        let advisory = Arc::new(StaticAdvisory::secure());
        let cached = CachedAdvisory::new(
            Arc::clone(&advisory) as Arc<dyn DeviceSecurityAdvisory>,
            Duration::from_secs(60),
        );
        assert_eq!(cached.assess().verdict, SecurityVerdict::Secure);

        advisory.set_threats(vec!["root detected".into()]);
        // Still cached.
        assert_eq!(cached.assess().verdict, SecurityVerdict::Secure);
        cached.invalidate();
        let fresh = cached.assess();
        assert_eq!(fresh.verdict, SecurityVerdict::Insecure);
        assert_eq!(fresh.threats, vec!["root detected".to_string()]);
    }
}
