//! Window slot table and screen layout.

use sheetstream_protocols::{ScreenSize, TaskId, WindowBounds};

/// Fixed pool of window positions.
///
/// Reservation is a single insert-if-absent on the first free position, so a
/// slot is owned from the moment it is returned.
#[derive(Debug, Clone)]
pub struct SlotTable {
    slots: Vec<Option<TaskId>>,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Claim the lowest free position for `owner`.
    pub fn reserve(&mut self, owner: &TaskId) -> Option<usize> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(owner.clone());
        Some(index)
    }

    /// Free a position, returning its previous owner.
    pub fn release(&mut self, index: usize) -> Option<TaskId> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Bounds of `slot` in a 2x2 grid over the screen; positions past four wrap.
pub fn quadrant(slot: usize, screen: ScreenSize) -> WindowBounds {
    let width = screen.width / 2;
    let height = screen.height / 2;
    let cell = slot % 4;
    WindowBounds {
        left: (cell % 2) as u32 * width,
        top: (cell / 2) as u32 * height,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sheetstream_protocols::{CellRef, TaskType};

    fn id(n: usize) -> TaskId {
        TaskId::new(CellRef::new(4, 9), TaskType::Ai, n)
    }

    #[test]
    fn test_reserve_lowest_free() {
        let mut table = SlotTable::new(3);
        assert_eq!(table.reserve(&id(0)), Some(0));
        assert_eq!(table.reserve(&id(1)), Some(1));
        assert_eq!(table.release(0), Some(id(0)));
        assert_eq!(table.reserve(&id(2)), Some(0));
        assert_eq!(table.occupied(), 2);
    }

    #[test]
    fn test_reserve_when_full() {
        let mut table = SlotTable::new(1);
        assert_eq!(table.reserve(&id(0)), Some(0));
        assert_eq!(table.reserve(&id(1)), None);
        assert_eq!(table.release(0), Some(id(0)));
        assert_eq!(table.reserve(&id(1)), Some(0));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut table = SlotTable::new(2);
        table.reserve(&id(0));
        assert!(table.release(0).is_some());
        assert!(table.release(0).is_none());
        assert!(table.release(7).is_none());
    }

    #[test]
    fn test_quadrants() {
        let screen = ScreenSize { width: 1920, height: 1080 };
        assert_eq!(quadrant(0, screen), WindowBounds { left: 0, top: 0, width: 960, height: 540 });
        assert_eq!(quadrant(1, screen).left, 960);
        assert_eq!(quadrant(2, screen).top, 540);
        assert_eq!(quadrant(3, screen), WindowBounds { left: 960, top: 540, width: 960, height: 540 });
        assert_eq!(quadrant(4, screen), quadrant(0, screen));
    }
}
