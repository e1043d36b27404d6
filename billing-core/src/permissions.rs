use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Operation a grant can allow on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn letter(self) -> char {
        match self {
            Action::Create => 'C',
            Action::Read => 'R',
            Action::Update => 'U',
            Action::Delete => 'D',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'C' => Some(Action::Create),
            'R' => Some(Action::Read),
            'U' => Some(Action::Update),
            'D' => Some(Action::Delete),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Action::Create => 0b0001,
            Action::Read => 0b0010,
            Action::Update => 0b0100,
            Action::Delete => 0b1000,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Subset of {Create, Read, Update, Delete}.
///
/// Serialized in the compact descriptor form used by the security service,
/// e.g. `"CRU"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const NONE: CapabilitySet = CapabilitySet(0);
    pub const ALL: CapabilitySet = CapabilitySet(0b1111);

    /// Parses a descriptor such as `"CRUD"` or `"CR"`. Unknown letters are ignored.
    pub fn parse(descriptor: &str) -> Self {
        descriptor
            .chars()
            .filter_map(Action::from_letter)
            .fold(Self::NONE, |set, action| set.with(action))
    }

    pub fn with(self, action: Action) -> Self {
        CapabilitySet(self.0 | action.bit())
    }

    pub fn union(self, other: CapabilitySet) -> Self {
        CapabilitySet(self.0 | other.0)
    }

    pub fn contains(self, action: Action) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn contains_all(self, other: CapabilitySet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<String> for CapabilitySet {
    fn from(descriptor: String) -> Self {
        CapabilitySet::parse(&descriptor)
    }
}

impl From<CapabilitySet> for String {
    fn from(set: CapabilitySet) -> Self {
        Action::ALL
            .iter()
            .filter(|a| set.contains(**a))
            .map(|a| a.letter())
            .collect()
    }
}

/// Screen or resource of the console that permissions apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    Dashboard,
    ClientTypes,
    Clients,
    Invoices,
    Products,
    ClientReport,
    InvoiceReport,
}

impl ModuleId {
    /// Menu order of the navigation shell.
    pub const MENU: [ModuleId; 7] = [
        ModuleId::Dashboard,
        ModuleId::ClientTypes,
        ModuleId::Clients,
        ModuleId::Invoices,
        ModuleId::Products,
        ModuleId::ClientReport,
        ModuleId::InvoiceReport,
    ];

    /// Permission name used by the security service, for modules granted directly.
    pub fn remote_name(self) -> Option<&'static str> {
        match self {
            ModuleId::ClientTypes => Some("Tipos de Cliente"),
            ModuleId::Clients => Some("Clientes"),
            ModuleId::Invoices => Some("Facturas"),
            ModuleId::Products => Some("Productos"),
            ModuleId::Dashboard | ModuleId::ClientReport | ModuleId::InvoiceReport => None,
        }
    }

    pub fn from_remote_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::MENU
            .iter()
            .copied()
            .find(|m| m.remote_name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    pub fn label(self) -> &'static str {
        match self {
            ModuleId::Dashboard => "Inicio",
            ModuleId::ClientTypes => "Tipos de Cliente",
            ModuleId::Clients => "Clientes",
            ModuleId::Invoices => "Facturas",
            ModuleId::Products => "Productos",
            ModuleId::ClientReport => "Reporte Clientes",
            ModuleId::InvoiceReport => "Reporte Facturas",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            ModuleId::Dashboard => "/dashboard",
            ModuleId::ClientTypes => "/tipo-clientes",
            ModuleId::Clients => "/clientes",
            ModuleId::Invoices => "/facturas",
            ModuleId::Products => "/productos",
            ModuleId::ClientReport => "/reportes/clientes",
            ModuleId::InvoiceReport => "/reportes/facturas",
        }
    }
}

/// Permission entry as returned by the security service on login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    #[serde(default)]
    pub id_permiso: i64,
    pub nombre_permiso: String,
    /// Descriptor letters, e.g. `"CRUD"`.
    #[serde(default)]
    pub descripcion: String,
    #[serde(default)]
    pub url_permiso: String,
    #[serde(default)]
    pub estado: bool,
    #[serde(default)]
    pub id_modulo: String,
}

/// Capabilities of a user, per module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    modules: BTreeMap<ModuleId, CapabilitySet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub module: ModuleId,
    pub label: &'static str,
    pub path: &'static str,
}

/// Capabilities on the source module that unlock its report.
const REPORT_REQUIREMENT: CapabilitySet = CapabilitySet(0b0111);

impl Permissions {
    /// Builds the capability map from login grants.
    ///
    /// Disabled grants and grants for unknown modules contribute nothing;
    /// several grants for the same module are merged.
    pub fn from_grants(grants: &[PermissionGrant]) -> Self {
        let mut modules = BTreeMap::new();
        for grant in grants.iter().filter(|g| g.estado) {
            if let Some(module) = ModuleId::from_remote_name(&grant.nombre_permiso) {
                let set = modules.entry(module).or_insert(CapabilitySet::NONE);
                *set = set.union(CapabilitySet::parse(&grant.descripcion));
            }
        }
        modules.retain(|_, set: &mut CapabilitySet| !set.is_empty());
        Self { modules }
    }

    pub fn capabilities(&self, module: ModuleId) -> CapabilitySet {
        match module {
            ModuleId::Dashboard => CapabilitySet::NONE.with(Action::Read),
            ModuleId::ClientReport => self.report_access(ModuleId::Clients),
            ModuleId::InvoiceReport => self.report_access(ModuleId::Invoices),
            _ => self.modules.get(&module).copied().unwrap_or_default(),
        }
    }

    fn report_access(&self, source: ModuleId) -> CapabilitySet {
        if self.capabilities(source).contains_all(REPORT_REQUIREMENT) {
            CapabilitySet::NONE.with(Action::Read)
        } else {
            CapabilitySet::NONE
        }
    }

    pub fn allows(&self, module: ModuleId, action: Action) -> bool {
        self.capabilities(module).contains(action)
    }

    /// Menu entries the user can read, in menu order.
    pub fn navigation(&self) -> Vec<NavItem> {
        ModuleId::MENU
            .iter()
            .copied()
            .filter(|m| self.allows(*m, Action::Read))
            .map(|module| NavItem {
                module,
                label: module.label(),
                path: module.path(),
            })
            .collect()
    }
}
