use inago_controller::GroupStatus;
use inago_core::UnitStatus;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// What a feedback line talks about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope<'a> {
    /// A group without slices.
    Group,
    /// Every slice of a group.
    AllSlices,
    Slices(&'a [String]),
}

impl<'a> Scope<'a> {
    pub fn new(singleton: bool, slice_ids: &'a [String]) -> Self {
        match (singleton, slice_ids.is_empty()) {
            (true, true) => Scope::Group,
            (false, true) => Scope::AllSlices,
            _ => Scope::Slices(slice_ids),
        }
    }
}

fn id_list(ids: &[String]) -> String {
    format!("[{}]", ids.join(" "))
}

fn subject(descriptor: &str, group: &str, scope: &Scope<'_>) -> String {
    match scope {
        Scope::Group => format!("{descriptor} group '{group}'"),
        Scope::AllSlices => format!("{descriptor} all slices of group '{group}'"),
        Scope::Slices(ids) => format!(
            "{descriptor} {} slices for group '{group}': {}",
            ids.len(),
            id_list(ids)
        ),
    }
}

pub fn success_message(descriptor: &str, group: &str, scope: &Scope<'_>) -> String {
    format!("Succeeded to {}.", subject(descriptor, group, scope))
}

pub fn failure_message(descriptor: &str, group: &str, scope: &Scope<'_>, err: &str) -> String {
    format!("Failed to {}. ({err})", subject(descriptor, group, scope))
}

pub fn no_unit_found_message(args: &[String]) -> String {
    format!("No unit found for group slice(s) '{}'.", id_list(args))
}

/// `"unit slice not found: x"` becomes `"Unit slice not found: x."`.
pub fn sentence(msg: &str) -> String {
    let mut chars = msg.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Units")]
    units: String,
    #[tabled(rename = "FDState")]
    desired: String,
    #[tabled(rename = "FCState")]
    current: String,
    #[tabled(rename = "SAState")]
    active: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Machine")]
    machine: String,
}

/// [`StatusRow`] with the unit hash reported by each machine.
#[derive(Tabled)]
struct VerboseStatusRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Units")]
    units: String,
    #[tabled(rename = "FDState")]
    desired: String,
    #[tabled(rename = "FCState")]
    current: String,
    #[tabled(rename = "SAState")]
    active: String,
    #[tabled(rename = "Hash")]
    hash: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Machine")]
    machine: String,
}

impl From<VerboseStatusRow> for StatusRow {
    fn from(row: VerboseStatusRow) -> Self {
        Self {
            group: row.group,
            units: row.units,
            desired: row.desired,
            current: row.current,
            active: row.active,
            ip: row.ip,
            machine: row.machine,
        }
    }
}

/// One row per unit and machine. Units without a machine get `-` cells.
fn rows(group: &str, statuses: &[UnitStatus], out: &mut Vec<VerboseStatusRow>) {
    for us in statuses {
        let label = if us.slice_id.is_empty() {
            group.to_string()
        } else {
            format!("{group}@{}", us.slice_id)
        };
        let row = |active: &str, hash: &str, ip: &str, machine: &str| VerboseStatusRow {
            group: label.clone(),
            units: us.name.clone(),
            desired: us.desired.to_string(),
            current: us.current.to_string(),
            active: active.to_string(),
            hash: hash.to_string(),
            ip: ip.to_string(),
            machine: machine.to_string(),
        };

        if us.machines.is_empty() {
            out.push(row("-", "-", "-", "-"));
        }
        for m in &us.machines {
            out.push(row(&m.systemd_active, &m.unit_hash, &m.ip, &m.id));
        }
    }
}

fn render(rows: Vec<VerboseStatusRow>, verbose: bool) -> String {
    let mut table = if verbose {
        Table::new(rows)
    } else {
        Table::new(rows.into_iter().map(StatusRow::from))
    };
    table.with(Style::empty()).to_string()
}

/// One row per unit and machine of `group`.
pub fn status_table(group: &str, statuses: &[UnitStatus], verbose: bool) -> String {
    let mut out = Vec::new();
    rows(group, statuses, &mut out);
    render(out, verbose)
}

pub fn list_table(groups: &[GroupStatus]) -> String {
    let mut out = Vec::new();
    for g in groups {
        rows(&g.group, &g.units, &mut out);
    }
    render(out, false)
}
