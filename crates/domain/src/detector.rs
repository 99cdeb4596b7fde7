//! Pure classification of transactions against the job whitelist.

use crate::model::{Detection, Selector, Transaction, Whitelist};

/// Decides whether a transaction calls the watched function on a
/// whitelisted job. Stateless and deterministic, so a cycle can be replayed
/// without changing its outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkDetector;

impl WorkDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(
        &self,
        tx: &Transaction,
        whitelist: &Whitelist,
        selector: &Selector,
    ) -> Detection {
        let Some(target) = &tx.to else {
            return Detection::NoMatch;
        };

        if whitelist.contains(target) && selector.prefixes(&tx.data) {
            Detection::Match {
                job: target.clone(),
            }
        } else {
            Detection::NoMatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Address;

    const SELECTOR: Selector = Selector::new([0x61, 0x91, 0xc7, 0x82]);

    fn whitelist(entries: &[&str]) -> Whitelist {
        entries.iter().copied().map(Address::new).collect()
    }

    fn work_data() -> Vec<u8> {
        vec![0x61, 0x91, 0xc7, 0x82, 0x00, 0x00]
    }

    #[test]
    fn matches_mixed_case_job_and_returns_lowercase() {
        let tx = Transaction::new("0x01", Some(Address::new("0xJOB")), work_data());
        let detection = WorkDetector::new().detect(&tx, &whitelist(&["0xJOB"]), &SELECTOR);

        assert!(detection.is_match());
        assert_eq!(detection.job().map(Address::as_str), Some("0xjob"));
    }

    #[test]
    fn contract_creation_never_matches() {
        let tx = Transaction::new("0x02", None, vec![0x61, 0x91, 0xc7, 0x82]);
        let detection = WorkDetector::new().detect(&tx, &whitelist(&["0xjob"]), &SELECTOR);
        assert_eq!(detection, Detection::NoMatch);
    }

    #[test]
    fn requires_whitelisted_target() {
        let tx = Transaction::new("0x03", Some(Address::new("0xother")), work_data());
        let detection = WorkDetector::new().detect(&tx, &whitelist(&["0xjob"]), &SELECTOR);
        assert!(!detection.is_match());
    }

    #[test]
    fn requires_selector_prefix() {
        let detector = WorkDetector::new();
        let jobs = whitelist(&["0xjob"]);

        let wrong = Transaction::new(
            "0x04",
            Some(Address::new("0xjob")),
            vec![0xde, 0xad, 0xbe, 0xef],
        );
        assert!(!detector.detect(&wrong, &jobs, &SELECTOR).is_match());

        let short = Transaction::new("0x05", Some(Address::new("0xjob")), vec![0x61, 0x91, 0xc7]);
        assert!(!detector.detect(&short, &jobs, &SELECTOR).is_match());

        let empty = Transaction::new("0x06", Some(Address::new("0xjob")), Vec::new());
        assert!(!detector.detect(&empty, &jobs, &SELECTOR).is_match());
    }

    #[test]
    fn casing_does_not_change_matched_value() {
        let detector = WorkDetector::new();
        let jobs = whitelist(&["0xabcdef"]);
        let upper = Transaction::new("0x07", Some(Address::new("0xABCDEF")), work_data());
        let lower = Transaction::new("0x08", Some(Address::new("0xabcdef")), work_data());

        assert_eq!(
            detector.detect(&upper, &jobs, &SELECTOR),
            detector.detect(&lower, &jobs, &SELECTOR)
        );
    }

    #[test]
    fn detection_is_deterministic() {
        let detector = WorkDetector::new();
        let jobs = whitelist(&["0xjob"]);
        let tx = Transaction::new("0x09", Some(Address::new("0xjob")), work_data());
        let first = detector.detect(&tx, &jobs, &SELECTOR);
        for _ in 0..3 {
            assert_eq!(detector.detect(&tx, &jobs, &SELECTOR), first);
        }
    }
}
