//! Run-level summary: the user-visible report of a harvest or sync job.

use std::fmt;

/// What a failure or count refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Price,
    Financials,
    Qualitative,
    /// Registry journal commit or batch-end compaction.
    Registry,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Price => "price",
            Category::Financials => "financials",
            Category::Qualitative => "qualitative",
            Category::Registry => "registry",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl CategoryCounts {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// One recorded per-entity failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Entity code, or empty for batch-level failures.
    pub code: String,
    pub category: Category,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entities selected for this run.
    pub selected: usize,
    pub price: CategoryCounts,
    /// Price fetches that were up to date or returned nothing new.
    pub no_new_data: usize,
    /// Price fetches that replaced the whole history after a corporate action.
    pub full_refetches: usize,
    pub financials: CategoryCounts,
    pub qualitative: CategoryCounts,
    pub failures: Vec<Failure>,
    /// The loop stopped early because the price provider blocked requests.
    pub aborted: bool,
}

impl RunSummary {
    pub fn new(selected: usize) -> Self {
        Self {
            selected,
            ..Self::default()
        }
    }

    fn counts_mut(&mut self, category: Category) -> Option<&mut CategoryCounts> {
        match category {
            Category::Price => Some(&mut self.price),
            Category::Financials => Some(&mut self.financials),
            Category::Qualitative => Some(&mut self.qualitative),
            Category::Registry => None,
        }
    }

    pub fn succeeded(&mut self, category: Category) {
        if let Some(c) = self.counts_mut(category) {
            c.succeeded += 1;
        }
    }

    pub fn skipped(&mut self, category: Category) {
        if let Some(c) = self.counts_mut(category) {
            c.skipped += 1;
        }
    }

    pub fn failed(&mut self, code: &str, category: Category, reason: impl fmt::Display) {
        if let Some(c) = self.counts_mut(category) {
            c.failed += 1;
        }
        self.failures.push(Failure {
            code: code.to_string(),
            category,
            reason: reason.to_string(),
        });
    }

    pub fn no_new_data(&mut self) {
        self.no_new_data += 1;
        self.price.skipped += 1;
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failures_in(&self, category: Category) -> impl Iterator<Item = &Failure> {
        self.failures.iter().filter(move |f| f.category == category)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = |f: &mut fmt::Formatter<'_>, name: &str, c: &CategoryCounts| {
            writeln!(
                f,
                "  {name:<12} {:>4} ok  {:>4} failed  {:>4} skipped",
                c.succeeded, c.failed, c.skipped
            )
        };
        writeln!(f, "Entities processed: {}", self.selected)?;
        line(f, "prices", &self.price)?;
        writeln!(
            f,
            "  {:<12} {:>4} no new data  {:>4} full refetch",
            "", self.no_new_data, self.full_refetches
        )?;
        line(f, "financials", &self.financials)?;
        line(f, "qualitative", &self.qualitative)?;
        if self.aborted {
            writeln!(f, "  stopped early: provider blocked requests")?;
        }
        for failure in &self.failures {
            if failure.code.is_empty() {
                writeln!(f, "  FAIL [{}]: {}", failure.category, failure.reason)?;
            } else {
                writeln!(f, "  FAIL {} [{}]: {}", failure.code, failure.category, failure.reason)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_category() {
        let mut s = RunSummary::new(3);
        s.succeeded(Category::Price);
        s.no_new_data();
        s.failed("7203.T", Category::Price, "timeout");
        s.skipped(Category::Qualitative);
        s.failed("", Category::Registry, "disk full");

        assert_eq!(s.price, CategoryCounts { succeeded: 1, failed: 1, skipped: 1 });
        assert_eq!(s.price.total(), 3);
        assert_eq!(s.no_new_data, 1);
        assert_eq!(s.qualitative.skipped, 1);
        assert_eq!(s.failures.len(), 2);
        assert_eq!(s.failures_in(Category::Registry).count(), 1);
    }

    #[test]
    fn display_lists_failures() {
        let mut s = RunSummary::new(1);
        s.failed("7203.T", Category::Financials, "response format changed");
        let text = s.to_string();
        assert!(text.contains("FAIL 7203.T [financials]: response format changed"));
    }
}
