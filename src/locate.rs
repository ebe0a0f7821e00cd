//! Translate a drive's controller address into an enclosure tool's
//! locate-LED invocation.

use crate::collectors::exec::find_tool;
use crate::collectors::{sas, storcli};
use crate::error::{Error, Result};
use crate::models::drive::{DriveRecord, UNKNOWN};
use crate::models::location::Location;
use crate::registry::{Inventory, Key};
use std::path::PathBuf;
use std::process::Command;
use tracing::{info, warn};

/// Enclosure management tools that can drive a locate LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateTool {
    Storcli,
    Sas3ircu,
    Sas2ircu,
}

impl LocateTool {
    /// Auto-selection order when no tool is requested.
    pub const PRIORITY: [LocateTool; 3] = [LocateTool::Storcli, LocateTool::Sas3ircu, LocateTool::Sas2ircu];

    pub fn name(&self) -> &'static str {
        match self {
            LocateTool::Storcli  => "storcli",
            LocateTool::Sas3ircu => "sas3ircu",
            LocateTool::Sas2ircu => "sas2ircu",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        let n = name.trim().to_ascii_lowercase();
        match n.as_str() {
            "storcli" | "storcli64" | "perccli" | "perccli64" => Ok(LocateTool::Storcli),
            "sas3ircu" => Ok(LocateTool::Sas3ircu),
            "sas2ircu" => Ok(LocateTool::Sas2ircu),
            _ => Err(Error::UnknownTool(name.to_string())),
        }
    }

    /// Executable names to search for.
    pub fn binaries(&self) -> &'static [&'static str] {
        match self {
            LocateTool::Storcli  => storcli::TOOLS,
            LocateTool::Sas3ircu => &sas::TOOLS[..1],
            LocateTool::Sas2ircu => &sas::TOOLS[1..],
        }
    }

    /// Arguments addressing one slot, in the tool's own vocabulary.
    pub fn args(&self, controller: u32, enclosure: u32, slot: u32, on: bool) -> Vec<String> {
        match self {
            LocateTool::Storcli => vec![
                format!("/c{}/e{}/s{}", controller, enclosure, slot),
                if on { "start" } else { "stop" }.to_string(),
                "locate".to_string(),
            ],
            LocateTool::Sas3ircu | LocateTool::Sas2ircu => vec![
                controller.to_string(),
                "LOCATE".to_string(),
                format!("{}:{}", enclosure, slot),
                if on { "ON" } else { "OFF" }.to_string(),
            ],
        }
    }

    fn find(&self) -> Option<PathBuf> {
        find_tool(self.binaries())
    }

    /// Whether this tool's controller numbering produced the drive's
    /// address. storcli records carry a controller drive id; sas-ircu ones
    /// never do.
    pub fn addressed(&self, drive: &DriveRecord) -> bool {
        match self {
            LocateTool::Storcli                         => drive.controller_id.is_some(),
            LocateTool::Sas3ircu | LocateTool::Sas2ircu => drive.controller_id.is_none(),
        }
    }
}

/// Parse a desired indicator state; `None` means on.
pub fn parse_state(state: Option<&str>) -> Result<bool> {
    let Some(s) = state else { return Ok(true) };
    match s.trim().to_ascii_lowercase().as_str() {
        "on" | "1" | "true" | "yes" | "start" | "enable" => Ok(true),
        "off" | "0" | "false" | "no" | "stop" | "disable" => Ok(false),
        _ => Err(Error::InvalidState(s.to_string())),
    }
}

/// A `--locate` invocation with its state and tool already validated, so
/// usage errors surface before any collector runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocateRequest {
    pub drive: String,
    pub on:    bool,
    pub tool:  Option<LocateTool>,
}

impl LocateRequest {
    pub fn parse(drive: &str, state: Option<&str>, tool: Option<&str>) -> Result<Self> {
        let on = parse_state(state)?;
        let tool = tool
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(LocateTool::from_name)
            .transpose()?;
        Ok(Self { drive: drive.trim().to_string(), on, tool })
    }
}

/// Pick the tool to use: the requested one if it is installed, else the
/// first installed tool in priority order that speaks the drive's address.
pub fn select_tool(
    requested: Option<LocateTool>,
    drive: &DriveRecord,
    find: &dyn Fn(LocateTool) -> Option<PathBuf>,
) -> Result<(LocateTool, PathBuf)> {
    match requested {
        Some(tool) => {
            if !tool.addressed(drive) {
                warn!(drive = %drive.id, tool = tool.name(), "address was not reported by the requested tool");
            }
            find(tool).map(|p| (tool, p)).ok_or(Error::ToolUnavailable(tool.name()))
        }
        None => LocateTool::PRIORITY
            .into_iter()
            .filter(|t| t.addressed(drive))
            .find_map(|t| find(t).map(|p| (t, p)))
            .ok_or(Error::NoLocateTool),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocateCommand {
    pub program: PathBuf,
    pub args:    Vec<String>,
}

/// Look a drive up by id, serial or by-id alias.
pub fn find_drive<'a>(inv: &'a Inventory, name: &str) -> Result<&'a DriveRecord> {
    inv.resolve(Key::Node(name))
        .or_else(|| inv.resolve(Key::Serial(name)))
        .or_else(|| inv.resolve(Key::Alias(name)))
        .and_then(|id| inv.get(&id))
        .ok_or_else(|| Error::UnknownDrive(name.to_string()))
}

/// `(controller, enclosure, slot)` of a drive that a locate tool can address.
pub fn controller_address(drive: &DriveRecord) -> Result<(u32, u32, u32)> {
    match &drive.location {
        Some(Location::Controller { controller, enclosure, slot }) => Ok((*controller, *enclosure, *slot)),
        other => Err(Error::NotLocatable {
            drive:    drive.id.clone(),
            location: other.as_ref().map_or_else(|| UNKNOWN.to_string(), |l| l.to_string()),
        }),
    }
}

/// Build the invocation for the requested drive. The location is checked
/// before any tool is looked up.
pub fn plan(
    inv: &Inventory,
    req: &LocateRequest,
    find: &dyn Fn(LocateTool) -> Option<PathBuf>,
) -> Result<LocateCommand> {
    let record = find_drive(inv, &req.drive)?;
    let (c, e, s) = controller_address(record)?;
    let (tool, program) = select_tool(req.tool, record, find)?;
    Ok(LocateCommand { program, args: tool.args(c, e, s, req.on) })
}

/// Run the command once; a non-zero exit is reported as-is.
pub fn invoke(cmd: &LocateCommand) -> Result<()> {
    info!("running {} {}", cmd.program.display(), cmd.args.join(" "));
    let status = Command::new(&cmd.program).args(&cmd.args).status()?;
    if !status.success() {
        return Err(Error::CommandFailed {
            program: cmd.program.display().to_string(),
            code:    status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

/// Toggle the locate LED of the requested drive.
pub fn locate(inv: &Inventory, req: &LocateRequest) -> Result<()> {
    let cmd = plan(inv, req, &|t: LocateTool| t.find())?;
    invoke(&cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::drive::Facts;
    use crate::models::location::{Bus, Placement};
    use std::cell::Cell;

    fn inventory() -> Inventory {
        let mut inv = Inventory::new();
        inv.observe(
            Key::Node("sdc"),
            Facts {
                serial:        Some("ZA1B2C3D".into()),
                controller_id: Some("c0d14".into()),
                location:      Some(Placement::At(Location::Controller { controller: 0, enclosure: 252, slot: 5 })),
                ..Default::default()
            },
        );
        inv.observe(
            Key::Node("sdd"),
            Facts {
                serial:   Some("WD-WCC7K7654321".into()),
                location: Some(Placement::At(Location::Controller { controller: 1, enclosure: 2, slot: 3 })),
                ..Default::default()
            },
        );
        inv.observe(Key::Node("nvme0n1"), Facts { location: Some(Placement::NextOn(Bus::Nvme)), ..Default::default() });
        inv
    }

    fn request(drive: &str, on: bool, tool: Option<LocateTool>) -> LocateRequest {
        LocateRequest { drive: drive.into(), on, tool }
    }

    fn only(installed: &'static [LocateTool]) -> impl Fn(LocateTool) -> Option<PathBuf> {
        move |t| installed.contains(&t).then(|| PathBuf::from(format!("/usr/sbin/{}", t.name())))
    }

    const ALL: &[LocateTool] = &[LocateTool::Storcli, LocateTool::Sas3ircu, LocateTool::Sas2ircu];

    #[test]
    fn state_synonyms() {
        assert!(parse_state(None).unwrap());
        assert!(parse_state(Some("Start")).unwrap());
        assert!(!parse_state(Some("off")).unwrap());
        assert!(!parse_state(Some("0")).unwrap());
        assert!(matches!(parse_state(Some("blink")), Err(Error::InvalidState(_))));
    }

    #[test]
    fn request_is_validated_without_an_inventory() {
        assert!(matches!(LocateRequest::parse("sdc", Some("blink"), None), Err(Error::InvalidState(_))));
        assert!(matches!(LocateRequest::parse("sdc", None, Some("megacli")), Err(Error::UnknownTool(_))));

        let req = LocateRequest::parse(" sdc ", Some("off"), Some("perccli64")).unwrap();
        assert_eq!(req, request("sdc", false, Some(LocateTool::Storcli)));
        assert_eq!(LocateRequest::parse("sdc", None, Some("")).unwrap().tool, None);
    }

    #[test]
    fn bus_location_is_rejected_without_invoking_a_tool() {
        let inv = inventory();
        let looked_up = Cell::new(false);
        let find = |_: LocateTool| {
            looked_up.set(true);
            Some(PathBuf::from("/usr/sbin/storcli64"))
        };
        let err = plan(&inv, &request("nvme0n1", true, None), &find).unwrap_err();
        match err {
            Error::NotLocatable { drive, location } => {
                assert_eq!(drive, "nvme0n1");
                assert_eq!(location, "NVME:0");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!looked_up.get());
    }

    #[test]
    fn translates_per_tool() {
        let inv = inventory();
        let cmd = plan(&inv, &request("sdc", true, None), &only(ALL)).unwrap();
        assert_eq!(cmd.program, PathBuf::from("/usr/sbin/storcli"));
        assert_eq!(cmd.args, vec!["/c0/e252/s5", "start", "locate"]);

        let cmd = plan(&inv, &request("ZA1B2C3D", false, Some(LocateTool::Sas3ircu)), &only(ALL)).unwrap();
        assert_eq!(cmd.args, vec!["0", "LOCATE", "252:5", "OFF"]);
    }

    #[test]
    fn hba_address_is_never_handed_to_storcli() {
        let inv = inventory();
        let cmd = plan(&inv, &request("sdd", true, None), &only(ALL)).unwrap();
        assert_eq!(cmd.program, PathBuf::from("/usr/sbin/sas3ircu"));
        assert_eq!(cmd.args, vec!["1", "LOCATE", "2:3", "ON"]);

        let storcli_only = only(&[LocateTool::Storcli]);
        assert!(matches!(plan(&inv, &request("sdd", true, None), &storcli_only), Err(Error::NoLocateTool)));
        assert!(matches!(plan(&inv, &request("sdc", true, None), &only(&[LocateTool::Sas2ircu])), Err(Error::NoLocateTool)));
    }

    #[test]
    fn tool_selection_priority_and_validation() {
        let hba = DriveRecord::new("sdd");
        let (tool, _) = select_tool(None, &hba, &only(&[LocateTool::Sas2ircu, LocateTool::Sas3ircu])).unwrap();
        assert_eq!(tool, LocateTool::Sas3ircu);
        assert!(matches!(select_tool(None, &hba, &only(&[])), Err(Error::NoLocateTool)));
        assert!(matches!(
            select_tool(Some(LocateTool::Sas2ircu), &hba, &only(&[LocateTool::Storcli])),
            Err(Error::ToolUnavailable("sas2ircu"))
        ));
        assert!(matches!(LocateTool::from_name("megacli"), Err(Error::UnknownTool(_))));
    }

    #[test]
    fn unknown_drive() {
        let inv = inventory();
        assert!(matches!(plan(&inv, &request("sdq", true, None), &only(ALL)), Err(Error::UnknownDrive(_))));
    }
}
