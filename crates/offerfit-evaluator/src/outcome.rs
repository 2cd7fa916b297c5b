//! Pass/fail results of evaluation, with reasons and recommendations.

use std::fmt;

use crate::recommendation::OfferRecommendation;

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutcome {
    pub passed: bool,
    /// What produced the outcome, e.g. `resource[cpus]` or `task hello-0-server`.
    pub source: String,
    pub reason: String,
    pub recommendations: Vec<OfferRecommendation>,
    pub children: Vec<EvaluationOutcome>,
}

impl EvaluationOutcome {
    pub fn pass(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            source: source.into(),
            reason: reason.into(),
            recommendations: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn fail(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            ..Self::pass(source, reason)
        }
    }

    pub fn with_recommendations(mut self, recommendations: Vec<OfferRecommendation>) -> Self {
        self.recommendations = recommendations;
        self
    }

    pub fn with_children(mut self, children: Vec<EvaluationOutcome>) -> Self {
        self.children = children;
        self
    }

    /// Number of failing outcomes in this tree, including itself.
    pub fn failure_count(&self) -> usize {
        usize::from(!self.passed) + self.children.iter().map(Self::failure_count).sum::<usize>()
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let mark = if self.passed { "PASS" } else { "FAIL" };
        writeln!(
            f,
            "{:indent$}{mark}({}): {}",
            "",
            self.source,
            self.reason,
            indent = depth * 2
        )?;
        for child in &self.children {
            child.write_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_rendering_and_failure_count() {
        let outcome = EvaluationOutcome::fail("offer o1", "1 task failed").with_children(vec![
            EvaluationOutcome::pass("placement", "passthrough"),
            EvaluationOutcome::fail("resource[cpus]", "insufficient cpus"),
        ]);
        assert_eq!(outcome.failure_count(), 2);
        let rendered = outcome.to_string();
        assert!(rendered.starts_with("FAIL(offer o1): 1 task failed\n"));
        assert!(rendered.contains("  PASS(placement): passthrough\n"));
        assert!(rendered.contains("  FAIL(resource[cpus]): insufficient cpus\n"));
    }
}
