use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::error::{Result, UploadError};
use crate::upload::types::{AssetKind, SelectedFile, SlotStatus};
use std::collections::BTreeMap;

/// Upload state of one asset slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub kind: AssetKind,
    pub file: Option<SelectedFile>,
    pub status: SlotStatus,
    pub bytes_sent: u64,
    /// Failed chunk attempts, cumulative over the whole file.
    pub failures: u32,
    pub next_chunk: u64,
}

impl Slot {
    fn empty(kind: AssetKind) -> Self {
        Self {
            kind,
            file: None,
            status: SlotStatus::Empty,
            bytes_sent: 0,
            failures: 0,
            next_chunk: 0,
        }
    }

    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    fn rewind(&mut self) {
        self.status = if self.file.is_some() {
            SlotStatus::Selected
        } else {
            SlotStatus::Empty
        };
        self.bytes_sent = 0;
        self.failures = 0;
        self.next_chunk = 0;
    }
}

#[derive(Debug, Clone)]
pub struct SlotManager {
    slots: BTreeMap<AssetKind, Slot>,
    max_file_size: u64,
}

impl Default for SlotManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl SlotManager {
    pub fn new(max_file_size: u64) -> Self {
        let slots = AssetKind::ALL
            .into_iter()
            .map(|kind| (kind, Slot::empty(kind)))
            .collect();
        Self {
            slots,
            max_file_size,
        }
    }

    /// Puts `file` into the slot, returning the selection it replaced.
    pub fn select_file(
        &mut self,
        kind: AssetKind,
        file: SelectedFile,
    ) -> Result<Option<SelectedFile>> {
        if !kind.accepts(&file.name) {
            return Err(UploadError::validation(format!(
                "{} is not a valid {} file (expected {})",
                file.name,
                kind.label(),
                kind.accepted_patterns().join(", ")
            )));
        }
        if file.size > self.max_file_size {
            return Err(UploadError::validation(format!(
                "{} is too large ({} bytes, limit {} bytes)",
                file.name, file.size, self.max_file_size
            )));
        }

        let slot = self.slot_mut(kind);
        let previous = slot.file.replace(file);
        slot.rewind();
        Ok(previous)
    }

    pub fn remove_file(&mut self, kind: AssetKind) -> Option<SelectedFile> {
        let slot = self.slot_mut(kind);
        let previous = slot.file.take();
        slot.rewind();
        previous
    }

    /// Checks the cross-slot rules that must hold before an upload starts.
    pub fn validate(&self) -> Result<()> {
        if self.selected().next().is_none() {
            return Err(UploadError::validation(
                "Select at least one file to upload.",
            ));
        }
        if self.slot(AssetKind::TexturedModel).has_file()
            && !self.slot(AssetKind::PointCloud).has_file()
        {
            return Err(UploadError::validation(
                "A textured model requires also a point cloud to be properly displayed.",
            ));
        }
        Ok(())
    }

    pub fn slot(&self, kind: AssetKind) -> &Slot {
        // Every kind is inserted in `new` and never removed.
        &self.slots[&kind]
    }

    pub(crate) fn slot_mut(&mut self, kind: AssetKind) -> &mut Slot {
        self.slots.entry(kind).or_insert_with(|| Slot::empty(kind))
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    pub fn selected(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values().filter(|slot| slot.has_file())
    }

    pub fn selected_kinds(&self) -> Vec<AssetKind> {
        self.selected().map(|slot| slot.kind).collect()
    }

    /// True when at least one slot has a file and every such slot is done.
    pub fn all_selected_succeeded(&self) -> bool {
        let mut any = false;
        for slot in self.selected() {
            any = true;
            if slot.status != SlotStatus::Succeeded {
                return false;
            }
        }
        any
    }

    /// Keeps the selections but forgets any upload progress.
    pub fn rewind(&mut self) {
        self.slots.values_mut().for_each(Slot::rewind);
    }

    pub fn clear(&mut self) {
        for slot in self.slots.values_mut() {
            *slot = Slot::empty(slot.kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: u64) -> SelectedFile {
        SelectedFile::new(name, size, format!("/data/{}", name))
    }

    #[test]
    fn test_select_replaces_previous() {
        let mut slots = SlotManager::default();
        assert!(slots
            .select_file(AssetKind::Orthophoto, file("a.tif", 1))
            .unwrap()
            .is_none());
        let replaced = slots
            .select_file(AssetKind::Orthophoto, file("b.tif", 2))
            .unwrap();

        assert_eq!(replaced.unwrap().name, "a.tif");
        let slot = slots.slot(AssetKind::Orthophoto);
        assert_eq!(slot.file.as_ref().unwrap().name, "b.tif");
        assert_eq!(slot.status, SlotStatus::Selected);
    }

    #[test]
    fn test_select_rejects_wrong_type() {
        let mut slots = SlotManager::default();
        let err = slots
            .select_file(AssetKind::PointCloud, file("model.glb", 10))
            .unwrap_err();
        assert!(matches!(err, UploadError::Validation(_)));
        assert!(!slots.slot(AssetKind::PointCloud).has_file());
    }

    #[test]
    fn test_select_rejects_oversized() {
        let mut slots = SlotManager::new(100);
        let err = slots
            .select_file(AssetKind::Dsm, file("dsm.tif", 101))
            .unwrap_err();
        assert!(matches!(err, UploadError::Validation(_)));
    }

    #[test]
    fn test_remove_clears_slot() {
        let mut slots = SlotManager::default();
        slots
            .select_file(AssetKind::Dtm, file("dtm.tif", 5))
            .unwrap();
        assert_eq!(slots.remove_file(AssetKind::Dtm).unwrap().name, "dtm.tif");
        assert_eq!(slots.slot(AssetKind::Dtm).status, SlotStatus::Empty);
        assert!(slots.remove_file(AssetKind::Dtm).is_none());
    }

    #[test]
    fn test_validate_requires_a_file() {
        let slots = SlotManager::default();
        assert_eq!(
            slots.validate(),
            Err(UploadError::validation("Select at least one file to upload."))
        );
    }

    #[test]
    fn test_textured_model_needs_point_cloud() {
        let mut slots = SlotManager::default();
        slots
            .select_file(AssetKind::TexturedModel, file("mesh.glb", 5))
            .unwrap();
        slots
            .select_file(AssetKind::Orthophoto, file("ortho.tif", 5))
            .unwrap();
        assert!(matches!(slots.validate(), Err(UploadError::Validation(_))));

        slots
            .select_file(AssetKind::PointCloud, file("cloud.laz", 5))
            .unwrap();
        assert!(slots.validate().is_ok());
    }

    #[test]
    fn test_all_selected_succeeded() {
        let mut slots = SlotManager::default();
        assert!(!slots.all_selected_succeeded());

        slots
            .select_file(AssetKind::Orthophoto, file("o.tif", 5))
            .unwrap();
        slots
            .select_file(AssetKind::Dsm, file("d.tif", 5))
            .unwrap();
        slots.slot_mut(AssetKind::Orthophoto).status = SlotStatus::Succeeded;
        assert!(!slots.all_selected_succeeded());

        slots.slot_mut(AssetKind::Dsm).status = SlotStatus::Succeeded;
        assert!(slots.all_selected_succeeded());
    }

    #[test]
    fn test_rewind_keeps_selection() {
        let mut slots = SlotManager::default();
        slots
            .select_file(AssetKind::Orthophoto, file("o.tif", 50))
            .unwrap();
        {
            let slot = slots.slot_mut(AssetKind::Orthophoto);
            slot.status = SlotStatus::Failed;
            slot.failures = 10;
            slot.bytes_sent = 20;
        }
        slots.rewind();
        let slot = slots.slot(AssetKind::Orthophoto);
        assert_eq!(slot.status, SlotStatus::Selected);
        assert_eq!(slot.failures, 0);
        assert_eq!(slot.bytes_sent, 0);
        assert!(slot.has_file());
    }
}
