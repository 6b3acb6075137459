use crate::api::attendance::{
    AttendanceListResponse, BulkMarkAttendance, BulkMarkEntry, MarkAttendance, MarkFields,
    UpdateAttendance,
};
use crate::api::fuel_requisition::{
    CreateFuelRequisition, DecideRequisition, FuelItemInput, FuelListResponse, VerifyItem,
};
use crate::api::leave::{ApplyLeave, DecideLeave, LeaveListResponse, SetAllowance};
use crate::api::overtime::{
    OvertimeListResponse, OvertimeMonthSummary, SubmitOvertime, UpdateOvertimeSlots,
};
use crate::api::salary_sheet::{
    GenerateResult, GenerateSheets, SalarySheetInput, SalarySheetListResponse, SalarySheetPatch,
    SkippedSheet,
};
use crate::api::users::UserListResponse;
use crate::calc::attendance::{
    AttendanceAction, AttendanceStatus, MonthlyAttendanceSummary, SubStatus,
};
use crate::calc::calendar::MonthCalendar;
use crate::calc::leave::{LeaveCategory, LeaveStatus, LeaveType};
use crate::calc::salary::SalaryTotals;
use crate::calc::time_slots::{SlotInput, TimeSlot};
use crate::model::attendance::Attendance;
use crate::model::fuel_requisition::{FuelItem, FuelRequisition, RequisitionStatus};
use crate::model::leave::{LeaveAllowance, LeaveEntry};
use crate::model::overtime::OvertimeClaim;
use crate::model::salary_sheet::SalarySheet;
use crate::model::user::UserResponse;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Desk API",
        version = "1.0.0",
        description = r#"
## HR Desk

Back office for a small training organisation: attendance, leave, instructor overtime,
monthly salary sheets and fuel requisitions.

### Features
- **Attendance**: daily marks by staff, self check-in/check-out, monthly summaries
- **Leave**: requests with full, half and short leave, yearly allowance tracking
- **Instructor overtime**: time-slot claims priced from the instructor's salary
- **Salary sheets**: monthly sheets with deductions, tax and overtime pulled in
- **Fuel requisitions**: monthly mileage claims with per-item verification

### Security
Everything under `/api` requires a **JWT Bearer** access token from `/auth/login`.
HR and Admin act on anyone's records; employees and instructors see their own.

### Responses
- JSON with camelCase keys
- Errors are `{"message": "..."}`
- List endpoints are paginated with `page` and `perPage`
"#,
    ),
    paths(
        crate::api::attendance::mark_attendance,
        crate::api::attendance::bulk_mark_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::monthly_summary,

        crate::api::leave::apply_leave,
        crate::api::leave::list_leaves,
        crate::api::leave::get_leave,
        crate::api::leave::decide_leave,
        crate::api::leave::cancel_leave,
        crate::api::leave::get_allowance,
        crate::api::leave::set_allowance,

        crate::api::overtime::submit_claim,
        crate::api::overtime::list_claims,
        crate::api::overtime::get_claim,
        crate::api::overtime::update_claim,
        crate::api::overtime::verify_claim,
        crate::api::overtime::delete_claim,
        crate::api::overtime::monthly_summary,

        crate::api::users::me,
        crate::api::users::list_users,
        crate::api::users::get_user,
        crate::api::users::update_user,
        crate::api::users::delete_user,

        crate::api::salary_sheet::preview_sheet,
        crate::api::salary_sheet::create_sheet,
        crate::api::salary_sheet::generate_sheets,
        crate::api::salary_sheet::list_sheets,
        crate::api::salary_sheet::get_sheet,
        crate::api::salary_sheet::update_sheet,
        crate::api::salary_sheet::delete_sheet,

        crate::api::fuel_requisition::create_requisition,
        crate::api::fuel_requisition::list_requisitions,
        crate::api::fuel_requisition::get_requisition,
        crate::api::fuel_requisition::decide_requisition,
        crate::api::fuel_requisition::verify_item,
        crate::api::fuel_requisition::delete_requisition
    ),
    components(
        schemas(
            AttendanceStatus,
            SubStatus,
            AttendanceAction,
            Attendance,
            MarkFields,
            MarkAttendance,
            BulkMarkEntry,
            BulkMarkAttendance,
            UpdateAttendance,
            AttendanceListResponse,
            MonthlyAttendanceSummary,
            MonthCalendar,

            LeaveType,
            LeaveCategory,
            LeaveStatus,
            LeaveEntry,
            LeaveAllowance,
            ApplyLeave,
            DecideLeave,
            SetAllowance,
            LeaveListResponse,

            SlotInput,
            TimeSlot,
            OvertimeClaim,
            SubmitOvertime,
            UpdateOvertimeSlots,
            OvertimeListResponse,
            OvertimeMonthSummary,

            UserResponse,
            UserListResponse,

            SalarySheet,
            SalaryTotals,
            SalarySheetInput,
            SalarySheetPatch,
            GenerateSheets,
            GenerateResult,
            SkippedSheet,
            SalarySheetListResponse,

            RequisitionStatus,
            FuelItem,
            FuelRequisition,
            FuelItemInput,
            CreateFuelRequisition,
            DecideRequisition,
            VerifyItem,
            FuelListResponse
        )
    ),
    tags(
        (name = "Attendance", description = "Daily attendance marks and summaries"),
        (name = "Leave", description = "Leave requests and yearly allowances"),
        (name = "Instructor Overtime", description = "Instructor overtime claims"),
        (name = "Users", description = "User profiles"),
        (name = "Salary Sheets", description = "Monthly salary sheets"),
        (name = "Fuel Requisitions", description = "Monthly fuel requisitions"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_area_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/attendance/check-in",
            "/api/leaves/{id}/status",
            "/api/instructor-overtime/summary",
            "/api/salary-sheets/generate",
            "/api/fuel-requisitions/{id}/items/{item_id}/verify",
            "/api/users/me",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
