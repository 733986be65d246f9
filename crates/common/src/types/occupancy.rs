use super::ParkingLotId;
use serde::{Deserialize, Serialize};

/// 一个完整轮询周期的占用结果，发送后即丢弃
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyReport {
    pub parking_lot_id: ParkingLotId,
    pub occupied_spots: u32,
}

impl OccupancyReport {
    pub fn new(parking_lot_id: ParkingLotId, occupied_spots: u32) -> Self {
        Self {
            parking_lot_id,
            occupied_spots,
        }
    }
}
