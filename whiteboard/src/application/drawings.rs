use dashmap::DashMap;

use crate::models::{DrawingPoint, UserId};

/// Append only log of every point drawn since the server started, per user.
#[derive(Debug, Default)]
pub struct DrawingStore {
    points: DashMap<UserId, Vec<DrawingPoint>>,
}

impl DrawingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic with respect to other appends, for the same user or not.
    pub fn append(&self, user_id: UserId, point: DrawingPoint) {
        self.points.entry(user_id).or_default().push(point);
    }

    pub fn points(&self, user_id: &UserId) -> Vec<DrawingPoint> {
        self.points
            .get(user_id)
            .map(|points| points.clone())
            .unwrap_or_default()
    }

    /// Every user's points concatenated. Within a user the order is the
    /// order of appends; the order between users is unspecified.
    pub fn snapshot(&self) -> Vec<DrawingPoint> {
        let mut all = Vec::new();
        for entry in self.points.iter() {
            all.extend_from_slice(entry.value());
        }
        all
    }

    pub fn len(&self) -> usize {
        self.points.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
