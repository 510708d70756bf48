//! Filling in the parts of a [`Request`] the caller did not give: slice IDs
//! from the scheduler, fresh random slice IDs, and unit files from disk.

use std::collections::{HashMap, HashSet};
use std::io;

use rand::Rng;
use tracing::debug;

use inago_core::{template_name, Request, Unit};

use crate::controller::Controller;
use crate::error::ControllerError;

const SLICE_ID_ALPHABET: &[u8] = b"abcdef0123456789";
const SLICE_ID_LEN: u32 = 3;

/// Draws `n` slice IDs that collide neither with `taken` nor with each other.
pub fn new_slice_ids(n: usize, taken: &[String]) -> Result<Vec<String>, ControllerError> {
    let space = SLICE_ID_ALPHABET.len().pow(SLICE_ID_LEN);
    let mut taken: HashSet<String> = taken.iter().cloned().collect();
    if taken.len() + n > space {
        return Err(ControllerError::InvalidArgument(format!(
            "cannot draw {n} slice IDs with {} of {space} taken",
            taken.len()
        )));
    }

    let mut rng = rand::thread_rng();
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let id: String = (0..SLICE_ID_LEN)
            .map(|_| SLICE_ID_ALPHABET[rng.gen_range(0..SLICE_ID_ALPHABET.len())] as char)
            .collect();
        if taken.insert(id.clone()) {
            out.push(id);
        }
    }
    Ok(out)
}

impl Controller {
    /// Attaches the slice IDs the group currently has on the scheduler. A
    /// group without units keeps an empty slice list.
    pub async fn extend_with_existing_slice_ids(
        &self,
        mut req: Request,
    ) -> Result<Request, ControllerError> {
        let statuses = match self.group_status(&Request::new(req.group.clone())).await {
            Ok(statuses) => statuses,
            Err(e) if e.is_unit_not_found() => vec![],
            Err(e) => return Err(e),
        };

        let mut ids: Vec<String> = Vec::new();
        for us in statuses {
            if !us.slice_id.is_empty() && !ids.contains(&us.slice_id) {
                ids.push(us.slice_id);
            }
        }
        req.slice_ids = ids;
        Ok(req)
    }

    /// Replaces the slice IDs of a templated request with
    /// `req.desired_slices` fresh ones. Requests with singleton units are
    /// returned unchanged.
    pub async fn extend_with_random_slice_ids(
        &self,
        mut req: Request,
    ) -> Result<Request, ControllerError> {
        if req.units.is_empty() || !req.has_templated_units() {
            return Ok(req);
        }

        let existing = self
            .extend_with_existing_slice_ids(Request::new(req.group.clone()))
            .await?
            .slice_ids;
        req.slice_ids = new_slice_ids(req.desired_slices, &existing)?;
        req.desired_slices = 0;
        debug!(group = %req.group, slices = ?req.slice_ids, "drew slice IDs");
        Ok(req)
    }

    /// Loads every regular file of `<group_root>/<group>/`, ordered by name,
    /// as the units of `req`.
    pub fn extend_with_content(&self, mut req: Request) -> Result<Request, ControllerError> {
        let dir = self.group_root.join(&req.group);
        let entries = match self.file_system.read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ControllerError::GroupNotExist(req.group.clone()))
            }
            Err(source) => return Err(ControllerError::FileSystem { path: dir, source }),
        };

        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name)
            .collect();
        names.sort();
        if names.is_empty() {
            return Err(ControllerError::NoUnitFiles(dir.display().to_string()));
        }

        let mut units = Vec::with_capacity(names.len());
        for name in names {
            let path = dir.join(&name);
            let bytes = self
                .file_system
                .read_file(&path)
                .map_err(|source| ControllerError::FileSystem { path, source })?;
            units.push(Unit::new(name, String::from_utf8_lossy(&bytes).into_owned()));
        }
        req.units = units;
        Ok(req)
    }

    /// Slices of `req` whose units on the scheduler differ from the unit
    /// files in `req`. Returns the request narrowed to the dirty slices and
    /// whether there are any.
    ///
    /// Units are compared by name with the slice ID removed, so a service
    /// and a timer sharing a base are checked separately. Without slice IDs
    /// the group's existing slices are checked. A slice is dirty when it has
    /// no units, when one of its machines reports another content hash, or
    /// when its unit names differ from the request's.
    pub async fn group_needs_update(
        &self,
        req: &Request,
    ) -> Result<(Request, bool), ControllerError> {
        let mut want: HashMap<String, String> = HashMap::new();
        for unit in &req.units {
            want.insert(template_name(&unit.name), self.fleet.hash_of(&unit.content)?);
        }

        let ids = if req.slice_ids.is_empty() {
            self.extend_with_existing_slice_ids(req.clone()).await?.slice_ids
        } else {
            req.slice_ids.clone()
        };

        let statuses = match self.group_status(&Request::new(req.group.clone())).await {
            Ok(statuses) => statuses,
            Err(e) if e.is_unit_not_found() => vec![],
            Err(e) => return Err(e),
        };

        let mut dirty: Vec<String> = Vec::new();
        for id in &ids {
            let members: Vec<_> = statuses.iter().filter(|us| us.slice_id == *id).collect();
            let names: HashSet<String> = members.iter().map(|us| template_name(&us.name)).collect();

            let drifted = members.iter().any(|us| match want.get(&template_name(&us.name)) {
                Some(hash) => us.machines.iter().any(|m| m.unit_hash != *hash),
                None => true,
            });
            let missing = want.keys().any(|name| !names.contains(name));

            if (members.is_empty() || drifted || missing) && !dirty.contains(id) {
                dirty.push(id.clone());
            }
        }

        if dirty.is_empty() {
            return Ok((req.clone(), false));
        }
        let narrowed = Request {
            slice_ids: dirty,
            ..req.clone()
        };
        Ok((narrowed, true))
    }
}
