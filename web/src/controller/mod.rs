pub(crate) mod external_auth_controller;
pub(crate) mod health_check_controller;
