mod format;
mod json;
mod table;

pub(crate) use json::{cost_json, models_json, to_json};
pub(crate) use table::{
    render_account, render_cost, render_key, render_models, render_price, render_status,
};
