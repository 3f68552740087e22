use crate::{
    data::{Account, AccountInfo, AccountType, Error, Split},
    read::{read_ledger, SplitSink},
};
use std::{
    collections::{btree_map::Entry, BTreeMap},
    ffi::OsString,
    fs::File,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpenOptions {
    /// Proceed when another process holds the GnuCash lock on the file.
    pub tolerate_lock: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            tolerate_lock: true,
        }
    }
}

/// Accounts read from one ledger export, keyed (and therefore iterated) by
/// full account name.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    accounts: BTreeMap<String, Account>,
}

impl SplitSink for Ledger {
    fn use_split(&mut self, info: AccountInfo, split: Option<Split>) -> Result<(), Error> {
        let account = match self.accounts.entry(info.name.clone()) {
            Entry::Vacant(entry) => entry.insert(Account {
                info,
                splits: Vec::new(),
            }),
            Entry::Occupied(entry) => {
                let account = entry.into_mut();
                account.info.merge(info)?;
                account
            }
        };
        account.splits.extend(split);
        Ok(())
    }
}

impl Ledger {
    pub fn accounts<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = &'a Account> {
        self.accounts
            .values()
            .filter(move |account| self.selects(selector, &account.info))
    }

    fn selects(&self, selector: &Selector, info: &AccountInfo) -> bool {
        match selector {
            Selector::Tag(tag) => info.description().contains(tag.as_str()),
            Selector::Name(name) => info.name == *name || info.short_name() == name,
            Selector::Guid(guid) => info.guid.as_deref() == Some(guid.as_str()),
            Selector::Parent(parent) => {
                is_bank_account(info) && self.is_reached_from(&info.name, parent)
            }
        }
    }

    /// Walking down from `parent`, the first bank account met on each path is
    /// taken and its own sub-accounts are not visited. Ancestors missing from
    /// the ledger are walked through.
    fn is_reached_from(&self, name: &str, parent: &str) -> bool {
        let components: Vec<&str> = name.split(':').collect();
        let nearest_bank = (1..components.len())
            .rev()
            .find(|&depth| {
                self.accounts
                    .get(&components[..depth].join(":"))
                    .is_some_and(|ancestor| is_bank_account(&ancestor.info))
            })
            .unwrap_or(1);
        (nearest_bank..components.len()).any(|depth| is_named(&components[..depth], parent))
    }
}

fn is_bank_account(info: &AccountInfo) -> bool {
    info.account_type() == AccountType::Bank && !info.is_placeholder()
}

/// True if the account spelled by `components` is `parent`, given either as a
/// full name or as a short name.
fn is_named(components: &[&str], parent: &str) -> bool {
    components.last() == Some(&parent) || components.join(":") == parent
}

/// Opens a ledger export read-only.
pub(crate) fn open(path: &Path, options: OpenOptions) -> Result<Ledger, Error> {
    let lock = lock_path(path);
    if lock.exists() {
        if !options.tolerate_lock {
            return Err(Error::Locked(path.display().to_string()));
        }
        warn!(lock = %lock.display(), "ledger is locked by another process, reading anyway");
    }
    let mut ledger = Ledger::default();
    read_ledger(File::open(path)?, &mut ledger)?;
    info!(
        path = %path.display(),
        accounts = ledger.accounts.len(),
        "ledger loaded"
    );
    Ok(ledger)
}

/// GnuCash marks an open book with a sibling `<file>.LCK`.
fn lock_path(path: &Path) -> PathBuf {
    let mut lock = OsString::from(path.as_os_str());
    lock.push(".LCK");
    PathBuf::from(lock)
}

/// Which accounts of the ledger take part in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selector {
    /// Accounts whose description contains the tag.
    Tag(String),
    /// The account with this full or short name.
    Name(String),
    /// The account with this identifier.
    Guid(String),
    /// The non-placeholder bank accounts below the named parent, without
    /// descending into the sub-accounts of a selected one.
    Parent(String),
}

#[cfg(test)]
mod tests {
    use super::{is_named, lock_path, open, Ledger, OpenOptions, Selector};
    use crate::{data::Error, read::read_ledger};
    use rust_decimal_macros::dec;
    use std::path::Path;

    const LEDGER: &[u8] = b"\
account,                 guid, type,  placeholder, commodity, description,    date,       quantity
Assets:Bank,             p1,   BANK,  true,        EUR,       ,               ,
Assets:Bank:Savings,     g1,   BANK,  false,       EUR,       FBAR savings,   2023-03-01, 5000
Assets:Bank:Savings,     g1,   ,      ,            EUR,       ,               2023-06-01, 2000
Assets:Bank:Checking,    g2,   BANK,  false,       EUR,       ,               2023-02-01, 300
Assets:Bank:Old,         g3,   BANK,  true,        EUR,       ,               ,
Assets:Broker,           g4,   STOCK, false,       USD,       FBAR,           2023-01-10, 10
Assets:Bank:Sub:Deposit, g5,   BANK,  false,       CHF,       fbar,           2023-01-10, 10
Assets:Bank:Savings:Pocket, g6, BANK, false,       EUR,       ,               2023-01-10, 10
Assets:Bank:Old:Kid,     g7,   BANK,  false,       EUR,       ,               2023-01-10, 10
";

    fn ledger() -> Ledger {
        let mut ledger = Ledger::default();
        read_ledger(LEDGER, &mut ledger).unwrap();
        ledger
    }

    fn names(ledger: &Ledger, selector: Selector) -> Vec<String> {
        ledger
            .accounts(&selector)
            .map(|account| account.info.name.clone())
            .collect()
    }

    #[test]
    fn groups_splits_by_account() {
        let ledger = ledger();
        let savings = &ledger.accounts["Assets:Bank:Savings"];
        assert_eq!(savings.splits.len(), 2);
        assert_eq!(savings.splits[1].quantity, dec!(2000));
        assert_eq!(savings.info.description(), "FBAR savings");
        assert!(ledger.accounts["Assets:Bank:Old"].splits.is_empty());
    }

    #[test]
    fn inconsistent_metadata_is_an_error() {
        let mut ledger = Ledger::default();
        let csv = b"\
account, commodity, date,       quantity
Savings, EUR,       2023-06-01, 1
Savings, USD,       2023-06-02, 1
";
        assert!(matches!(
            read_ledger(&csv[..], &mut ledger),
            Err(Error::InconsistentAccount { .. })
        ));
    }

    #[test]
    fn select_by_tag() {
        assert_eq!(
            names(&ledger(), Selector::Tag("FBAR".into())),
            ["Assets:Bank:Savings", "Assets:Broker"]
        );
        assert!(names(&ledger(), Selector::Tag("nothing".into())).is_empty());
    }

    #[test]
    fn select_by_name_and_guid() {
        assert_eq!(
            names(&ledger(), Selector::Name("Checking".into())),
            ["Assets:Bank:Checking"]
        );
        assert_eq!(
            names(&ledger(), Selector::Name("Assets:Bank:Checking".into())),
            ["Assets:Bank:Checking"]
        );
        assert_eq!(
            names(&ledger(), Selector::Guid("g1".into())),
            ["Assets:Bank:Savings"]
        );
    }

    #[test]
    fn select_by_parent() {
        let expected = [
            "Assets:Bank:Checking",
            "Assets:Bank:Old:Kid",
            "Assets:Bank:Savings",
            "Assets:Bank:Sub:Deposit",
        ];
        assert_eq!(names(&ledger(), Selector::Parent("Bank".into())), expected);
        assert_eq!(
            names(&ledger(), Selector::Parent("Assets:Bank".into())),
            expected
        );
        assert_eq!(
            names(&ledger(), Selector::Parent("Sub".into())),
            ["Assets:Bank:Sub:Deposit"]
        );
        assert!(names(&ledger(), Selector::Parent("Nowhere".into())).is_empty());
    }

    #[test]
    fn select_by_parent_stops_at_bank_accounts() {
        // Pocket sits below the Savings bank account and is left out, while
        // Kid is reached through the Old placeholder.
        let selected = names(&ledger(), Selector::Parent("Bank".into()));
        assert!(!selected.contains(&"Assets:Bank:Savings:Pocket".to_owned()));
        assert!(selected.contains(&"Assets:Bank:Old:Kid".to_owned()));

        // A bank account named as the parent has its sub-accounts walked.
        assert_eq!(
            names(&ledger(), Selector::Parent("Savings".into())),
            ["Assets:Bank:Savings:Pocket"]
        );
        assert_eq!(
            names(&ledger(), Selector::Parent("Assets:Bank:Old".into())),
            ["Assets:Bank:Old:Kid"]
        );
    }

    #[test]
    fn parent_names() {
        assert!(is_named(&["Assets"], "Assets"));
        assert!(is_named(&["Assets", "Bank"], "Bank"));
        assert!(is_named(&["Assets", "Bank"], "Assets:Bank"));
        assert!(!is_named(&["Assets", "Banking"], "Assets:Bank"));
        assert!(!is_named(&["Assets", "Bank"], "Assets"));
    }

    #[test]
    fn lock_file_name() {
        assert_eq!(
            lock_path(Path::new("/tmp/book.gnucash")),
            Path::new("/tmp/book.gnucash.LCK")
        );
    }

    #[test]
    fn open_honours_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.csv");
        std::fs::write(&path, LEDGER).unwrap();
        std::fs::write(lock_path(&path), b"").unwrap();

        let ledger = open(&path, OpenOptions::default()).unwrap();
        assert_eq!(ledger.accounts.len(), 8);

        assert!(matches!(
            open(
                &path,
                OpenOptions {
                    tolerate_lock: false
                }
            ),
            Err(Error::Locked(_))
        ));
    }

    #[test]
    fn open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            open(&dir.path().join("missing.csv"), OpenOptions::default()),
            Err(Error::Io(_))
        ));
    }
}
