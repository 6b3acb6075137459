pub mod attendance;
pub mod fuel_requisition;
pub mod leave;
pub mod overtime;
pub mod salary_sheet;
pub mod users;
