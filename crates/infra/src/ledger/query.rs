use chrono::{DateTime, Utc};

use circulation_lending::{FineCalculator, Loan, LoanView};

/// Result of a ledger query.
///
/// Holds a snapshot of the matching loans in listing order. Views are built
/// on iteration with fines recomputed as of the query instant, so iterating
/// twice yields the same sequence.
#[derive(Debug, Clone)]
pub struct LoanQuery {
    loans: Vec<Loan>,
    fines: FineCalculator,
    as_of: DateTime<Utc>,
}

impl LoanQuery {
    pub(crate) fn new(loans: Vec<Loan>, fines: FineCalculator, as_of: DateTime<Utc>) -> Self {
        Self { loans, fines, as_of }
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn len(&self) -> usize {
        self.loans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }

    /// Stored records, without recomputed fines.
    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    pub fn iter(&self) -> impl Iterator<Item = LoanView> + '_ {
        self.loans
            .iter()
            .map(move |loan| loan.view(&self.fines, self.as_of))
    }
}

impl<'a> IntoIterator for &'a LoanQuery {
    type Item = LoanView;
    type IntoIter = Box<dyn Iterator<Item = LoanView> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
