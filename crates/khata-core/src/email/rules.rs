//! Ordered alert cascades, most specific first.
//!
//! Each rule is a name, a pattern and the kind of alert it recognises. All
//! rules share one set of capture names (`amount`, `date`, `account`, `card`,
//! `vpa`, `name`, `merchant`, `info`, `reference`) read by a single builder.

use crate::model::Institution;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    UpiDebit,
    UpiCredit,
    AccountDebit,
    AccountCredit,
    CardSpend,
    CardRefund,
}

impl AlertKind {
    pub fn is_credit(self) -> bool {
        matches!(
            self,
            AlertKind::UpiCredit | AlertKind::AccountCredit | AlertKind::CardRefund
        )
    }
}

#[derive(Debug)]
pub struct AlertRule {
    pub name: &'static str,
    pub kind: AlertKind,
    pub pattern: Regex,
}

const CURRENCY: &str = r"(?:Rs\.?|INR|₹)\s*";
const AMOUNT: &str = r"(?P<amount>\d[\d,]*(?:\.\d{1,2})?)";
const DATE: &str = r"(?P<date>\d{4}-\d{2}-\d{2}|\d{1,2}[-/ ](?:\d{1,2}|[A-Za-z]{3,9})[-/ ]\d{2,4})";
const VPA: &str = r"(?P<vpa>[\w.\-]+@[\w.\-]+)";

fn rule(name: &'static str, kind: AlertKind, template: &str) -> AlertRule {
    let pattern = format!("(?i){template}")
        .replace("{cur}", CURRENCY)
        .replace("{amount}", AMOUNT)
        .replace("{date}", DATE)
        .replace("{vpa}", VPA);
    AlertRule {
        name,
        kind,
        pattern: Regex::new(&pattern).unwrap(),
    }
}

static HDFC: LazyLock<Vec<AlertRule>> = LazyLock::new(|| {
    vec![
        rule(
            "hdfc-upi-debit",
            AlertKind::UpiDebit,
            r"{cur}{amount} has been debited from (?:your )?(?:a/c|account) (?:\*\*|x+)?(?P<account>\d{4}) to VPA {vpa} (?P<name>.+?) on {date}(?:.*?reference number is (?P<reference>\d+))?",
        ),
        rule(
            "hdfc-upi-credit",
            AlertKind::UpiCredit,
            r"{cur}{amount} is successfully credited to your account (?:\*\*|x+)?(?P<account>\d{4}) by VPA {vpa} (?P<name>.+?) on {date}(?:.*?reference number is (?P<reference>\d+))?",
        ),
        rule(
            "hdfc-account-debit",
            AlertKind::AccountDebit,
            r"{cur}{amount} has been debited from (?:your )?(?:a/c|account) (?:\*\*|x+)?(?P<account>\d{4})(?: (?:towards|for|to) (?P<info>.+?))? on {date}",
        ),
        rule(
            "hdfc-account-credit",
            AlertKind::AccountCredit,
            r"{cur}{amount} (?:is|has been) (?:successfully )?credited to (?:your )?(?:a/c|account) (?:\*\*|x+)?(?P<account>\d{4})(?: by (?P<info>.+?))? on {date}",
        ),
        rule(
            "hdfc-card-spend",
            AlertKind::CardSpend,
            r"{cur}{amount} (?:was |has been )?(?:spent|debited) (?:on|from) (?:your )?HDFC Bank (?:Credit )?Card (?:ending |x+)?(?P<card>\d{4}) at (?P<merchant>.+?) on {date}",
        ),
        rule(
            "hdfc-card-refund",
            AlertKind::CardRefund,
            r"(?:refund|reversal) of {cur}{amount} (?:from|by) (?P<merchant>.+?) (?:has been |is )?credited to (?:your )?HDFC Bank (?:Credit )?Card (?:ending |x+)?(?P<card>\d{4}) on {date}",
        ),
        rule(
            "hdfc-card-spend-alt",
            AlertKind::CardSpend,
            r"HDFC Bank Card (?:x+)?(?P<card>\d{4}) used for {cur}{amount} at (?P<merchant>.+?) on {date}",
        ),
    ]
});

static ICICI: LazyLock<Vec<AlertRule>> = LazyLock::new(|| {
    vec![
        rule(
            "icici-upi-debit",
            AlertKind::UpiDebit,
            r"ICICI Bank Acc(?:oun)?t XX(?P<account>\d{3,4}) (?:is )?debited (?:for|with) {cur}{amount} on {date}(?:;| and) (?P<name>.+?) credited\.? UPI:?\s*(?P<reference>\d+)",
        ),
        rule(
            "icici-upi-credit",
            AlertKind::UpiCredit,
            r"ICICI Bank Acc(?:oun)?t XX(?P<account>\d{3,4}) (?:is )?credited:? (?:with |for )?{cur}{amount} on {date} (?:by|from) (?P<name>.+?)\.? UPI:?\s*(?P<reference>\d+)",
        ),
        rule(
            "icici-account-debit",
            AlertKind::AccountDebit,
            r"ICICI Bank Acc(?:oun)?t XX(?P<account>\d{3,4}) (?:is )?debited (?:for|with) {cur}{amount} on {date}",
        ),
        rule(
            "icici-account-credit",
            AlertKind::AccountCredit,
            r"ICICI Bank Acc(?:oun)?t XX(?P<account>\d{3,4}) (?:is )?credited:? (?:with |for )?{cur}{amount} on {date}",
        ),
        rule(
            "icici-card-spend",
            AlertKind::CardSpend,
            r"{cur}{amount} spent (?:using|on) ICICI Bank (?:Credit )?Card XX(?P<card>\d{4}) on {date} (?:on|at) (?P<merchant>.+?)\.",
        ),
        rule(
            "icici-card-refund",
            AlertKind::CardRefund,
            r"refund of {cur}{amount} from (?P<merchant>.+?) (?:has been |is )?credited to (?:your )?ICICI Bank (?:Credit )?Card XX(?P<card>\d{4}) on {date}",
        ),
    ]
});

static KOTAK: LazyLock<Vec<AlertRule>> = LazyLock::new(|| {
    vec![
        rule(
            "kotak-upi-debit",
            AlertKind::UpiDebit,
            r"Sent {cur}{amount} from Kotak Bank A/?c X(?P<account>\d{4}) to {vpa} on {date}(?:.*?UPI Ref:?\s*(?P<reference>\d+))?",
        ),
        rule(
            "kotak-upi-credit",
            AlertKind::UpiCredit,
            r"Received {cur}{amount} in your Kotak Bank A/?c X(?P<account>\d{4}) from {vpa} on {date}(?:.*?UPI Ref:?\s*(?P<reference>\d+))?",
        ),
        rule(
            "kotak-account-debit",
            AlertKind::AccountDebit,
            r"{cur}{amount} (?:is |has been )?debited from (?:your )?Kotak Bank A/?c X(?P<account>\d{4}) on {date}(?: towards (?P<info>[^.]+))?",
        ),
        rule(
            "kotak-account-credit",
            AlertKind::AccountCredit,
            r"{cur}{amount} (?:is |has been )?credited to (?:your )?Kotak Bank A/?c X(?P<account>\d{4}) on {date}(?: (?:towards|by) (?P<info>[^.]+))?",
        ),
        rule(
            "kotak-card-spend",
            AlertKind::CardSpend,
            r"{cur}{amount} spent (?:on|using) (?:your )?Kotak (?:Bank )?Credit Card x(?P<card>\d{4}) at (?P<merchant>.+?) on {date}",
        ),
        rule(
            "kotak-card-refund",
            AlertKind::CardRefund,
            r"refund of {cur}{amount} from (?P<merchant>.+?) (?:has been |is )?credited to (?:your )?Kotak (?:Bank )?Credit Card x(?P<card>\d{4}) on {date}",
        ),
    ]
});

static AXIS: LazyLock<Vec<AlertRule>> = LazyLock::new(|| {
    vec![
        rule(
            "axis-upi-debit",
            AlertKind::UpiDebit,
            r"Amount Debited:\s*{cur}{amount}\s+Account Number:\s*XX(?P<account>\d{4})\s+Date & Time:\s*{date}[^A-Za-z]*(?:IST)?\s+Transaction Info:\s*UPI/P2[AM]/(?P<reference>\d+)/(?P<name>[^/]+?)\s*(?:/|$)",
        ),
        rule(
            "axis-upi-credit",
            AlertKind::UpiCredit,
            r"Amount Credited:\s*{cur}{amount}\s+Account Number:\s*XX(?P<account>\d{4})\s+Date & Time:\s*{date}[^A-Za-z]*(?:IST)?\s+Transaction Info:\s*UPI/P2[AM]/(?P<reference>\d+)/(?P<name>[^/]+?)\s*(?:/|$)",
        ),
        rule(
            "axis-account-debit",
            AlertKind::AccountDebit,
            r"Amount Debited:\s*{cur}{amount}\s+Account Number:\s*XX(?P<account>\d{4})\s+Date & Time:\s*{date}(?:[^A-Za-z]*(?:IST)?\s+Transaction Info:\s*(?P<info>\S+))?",
        ),
        rule(
            "axis-account-credit",
            AlertKind::AccountCredit,
            r"Amount Credited:\s*{cur}{amount}\s+Account Number:\s*XX(?P<account>\d{4})\s+Date & Time:\s*{date}(?:[^A-Za-z]*(?:IST)?\s+Transaction Info:\s*(?P<info>\S+))?",
        ),
        rule(
            "axis-card-spend",
            AlertKind::CardSpend,
            r"{cur}{amount} (?:was )?spent on (?:your )?Axis Bank Credit Card (?:no\. )?XX(?P<card>\d{4}) on {date}(?:[\s,]+[\d:]+(?:\s*IST)?)? at (?P<merchant>.+?)\.",
        ),
        rule(
            "axis-card-refund",
            AlertKind::CardRefund,
            r"refund of {cur}{amount} from (?P<merchant>.+?) (?:has been |is )?credited to (?:your )?Axis Bank Credit Card (?:no\. )?XX(?P<card>\d{4}) on {date}",
        ),
    ]
});

/// The cascade for an issuer; empty when no alert layouts are known.
pub fn cascade(institution: Institution) -> &'static [AlertRule] {
    match institution {
        Institution::Hdfc => &HDFC,
        Institution::Icici => &ICICI,
        Institution::Kotak => &KOTAK,
        Institution::Axis => &AXIS,
        Institution::Sbi | Institution::Generic => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_cascades_compile_with_unique_names() {
        let mut names = Vec::new();
        for inst in Institution::KNOWN {
            let rules = cascade(inst);
            assert!(!rules.is_empty(), "{inst} has no rules");
            names.extend(rules.iter().map(|r| r.name));
        }
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_upi_rules_precede_generic_rules() {
        for inst in Institution::KNOWN {
            let rules = cascade(inst);
            let first_generic = rules
                .iter()
                .position(|r| r.kind == AlertKind::AccountDebit)
                .unwrap();
            let upi_debit = rules.iter().position(|r| r.kind == AlertKind::UpiDebit).unwrap();
            assert!(upi_debit < first_generic, "{inst}");
        }
    }
}
