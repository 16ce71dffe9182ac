use std::fmt;

// per-record outcome of one pipeline stage.
#[derive(Debug)]
pub struct ItemOutcome<T, E> {
    pub id: String,
    pub result: Result<T, E>
}

#[derive(Debug)]
pub struct BatchReport<T, E> {
    pub stage: &'static str,
    pub outcomes: Vec<ItemOutcome<T, E>>
}

impl<T, E> BatchReport<T, E> {
    pub fn new(stage: &'static str) -> Self {
        BatchReport {
            stage,
            outcomes: Vec::new()
        }
    }

    pub fn push(&mut self, id: impl Into<String>, result: Result<T, E>) {
        self.outcomes.push(ItemOutcome {
            id: id.into(),
            result
        });
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    // records were attempted and none of them succeeded.
    pub fn failed_entirely(&self) -> bool {
        self.attempted() > 0 && self.succeeded() == 0
    }

    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &E)> {
        self.outcomes.iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.id.as_str(), e)))
    }

    pub fn into_successes(self) -> Vec<T> {
        self.outcomes.into_iter()
            .filter_map(|o| o.result.ok())
            .collect()
    }
}

impl<T, E> fmt::Display for BatchReport<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}/{} succeeded", self.stage, self.succeeded(), self.attempted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut report: BatchReport<u32, String> = BatchReport::new("summarize");
        report.push("a", Ok(1));
        report.push("b", Err(String::from("boom")));
        report.push("c", Ok(3));

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.failed_entirely());
        assert_eq!(report.failures().collect::<Vec<_>>(), vec![("b", &String::from("boom"))]);
        assert_eq!(report.to_string(), "summarize: 2/3 succeeded");
        assert_eq!(report.into_successes(), vec![1, 3]);
    }

    #[test]
    fn test_failed_entirely() {
        let empty: BatchReport<(), ()> = BatchReport::new("publish");
        assert!(!empty.failed_entirely());

        let mut report: BatchReport<(), ()> = BatchReport::new("publish");
        report.push("a", Err(()));
        assert!(report.failed_entirely());
    }
}
