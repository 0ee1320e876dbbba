//! Derived financial calculations over section data blobs.
//!
//! All functions are pure and total: numeric inputs arrive as JSON values
//! that may be numbers, numeric strings, empty strings, or missing, and
//! anything unparseable degrades to zero rather than erroring. Outputs are
//! rounded to whole currency units except where noted.

use serde::Serialize;
use serde_json::Value;

/// Permissive numeric parse: numbers pass through, numeric strings parse,
/// everything else (null, "", objects, garbage) is 0.0.
pub fn loose_f64(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Field lookup with permissive parsing; missing fields are 0.0.
pub fn loose_field(blob: &Value, field: &str) -> f64 {
    blob.get(field).map(loose_f64).unwrap_or(0.0)
}

/// True when a monthly record has a revenue value entered (not null, not "").
fn has_revenue(month: &Value) -> bool {
    match month.get("revenue") {
        Some(Value::Null) | None => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Gross profit = revenue - COGS.
pub fn gross_profit(revenue: f64, cogs: f64) -> f64 {
    revenue - cogs
}

/// EBITDA = gross profit - operating expenses.
pub fn ebitda(gross_profit: f64, opex: f64) -> f64 {
    gross_profit - opex
}

/// Trailing-twelve-month rollup over monthly records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtmSummary {
    pub revenue: f64,
    pub cogs: f64,
    pub gross_profit: f64,
    pub opex: f64,
    pub ebitda: f64,
    /// Percent, zero when revenue is zero.
    pub gross_margin: f64,
    /// Percent, zero when revenue is zero.
    pub ebitda_margin: f64,
}

/// Sums the last 12 months that have a revenue value entered — not
/// necessarily the last 12 calendar months when earlier ones are blank.
/// Returns `None` when no month has revenue.
pub fn ttm_rollup(monthly: &[Value]) -> Option<TtmSummary> {
    let with_data: Vec<&Value> = monthly.iter().filter(|m| has_revenue(m)).collect();
    let last12 = &with_data[with_data.len().saturating_sub(12)..];
    if last12.is_empty() {
        return None;
    }

    let sum = |field: &str| -> f64 { last12.iter().map(|m| loose_field(m, field)).sum() };

    let revenue = sum("revenue");
    let cogs = sum("cogs");
    let gross = gross_profit(revenue, cogs);
    let opex = sum("opex");
    let ebitda = ebitda(gross, opex);

    Some(TtmSummary {
        revenue,
        cogs,
        gross_profit: gross,
        opex,
        ebitda,
        gross_margin: if revenue > 0.0 { gross / revenue * 100.0 } else { 0.0 },
        ebitda_margin: if revenue > 0.0 { ebitda / revenue * 100.0 } else { 0.0 },
    })
}

/// Percentage drivers for the five-year projection, held as fractional
/// rates (0.20 for 20%).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectionDrivers {
    pub revenue_cagr: f64,
    pub gross_margin_target: f64,
    pub opex_pct_revenue: f64,
    pub da_pct: f64,
    pub capex_pct: f64,
    pub nwc_change_pct: f64,
    pub tax_rate: f64,
}

impl ProjectionDrivers {
    /// Reads percent-valued fields from a projections section blob.
    pub fn from_blob(blob: &Value) -> Self {
        let pct = |field: &str| loose_field(blob, field) / 100.0;
        ProjectionDrivers {
            revenue_cagr: pct("revenue_cagr"),
            gross_margin_target: pct("gross_margin_target"),
            opex_pct_revenue: pct("opex_pct_revenue"),
            da_pct: pct("da_pct"),
            capex_pct: pct("capex_pct"),
            nwc_change_pct: pct("nwc_change_pct"),
            tax_rate: pct("tax_rate"),
        }
    }
}

/// One projected year, rounded to whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectionYear {
    pub year: u32,
    pub revenue: i64,
    pub cogs: i64,
    pub gross_profit: i64,
    pub opex: i64,
    pub ebitda: i64,
    pub da: i64,
    pub capex: i64,
    pub nwc_change: i64,
    pub fcf: i64,
}

/// Five-year driver-based projection. Year 1 carries the base revenue
/// unchanged; years 2-5 compound by CAGR. Taxes are floored at zero and
/// FCF = NOPAT + D&A - capex - NWC change.
pub fn project_five_years(base_revenue: f64, d: &ProjectionDrivers) -> Vec<ProjectionYear> {
    let mut years = Vec::with_capacity(5);
    let mut rev = base_revenue;

    for i in 0..5u32 {
        if i > 0 {
            rev *= 1.0 + d.revenue_cagr;
        }
        let cogs = rev * (1.0 - d.gross_margin_target);
        let gross = rev - cogs;
        let opex = rev * d.opex_pct_revenue;
        let ebitda = gross - opex;
        let da = rev * d.da_pct;
        let ebit = ebitda - da;
        let taxes = (ebit * d.tax_rate).max(0.0);
        let nopat = ebit - taxes;
        let capex = rev * d.capex_pct;
        let nwc_change = rev * d.nwc_change_pct;
        let fcf = nopat + da - capex - nwc_change;

        years.push(ProjectionYear {
            year: i + 1,
            revenue: rev.round() as i64,
            cogs: cogs.round() as i64,
            gross_profit: gross.round() as i64,
            opex: opex.round() as i64,
            ebitda: ebitda.round() as i64,
            da: da.round() as i64,
            capex: capex.round() as i64,
            nwc_change: nwc_change.round() as i64,
            fcf: fcf.round() as i64,
        });
    }

    years
}

/// Raw cap-table inputs lifted out of the cap_table section blob.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapTableInputs {
    pub common_shares: f64,
    pub options_outstanding: f64,
    pub option_pool_authorized: f64,
    pub warrants: f64,
    pub safe_note_conversion_shares: f64,
    pub pre_money_valuation: f64,
    pub investment_amount: f64,
}

impl CapTableInputs {
    pub fn from_blob(blob: &Value) -> Self {
        CapTableInputs {
            common_shares: loose_field(blob, "common_shares"),
            options_outstanding: loose_field(blob, "options_outstanding"),
            option_pool_authorized: loose_field(blob, "option_pool_authorized"),
            warrants: loose_field(blob, "warrants"),
            safe_note_conversion_shares: loose_field(blob, "safe_note_conversion_shares"),
            pre_money_valuation: loose_field(blob, "pre_money_valuation"),
            investment_amount: loose_field(blob, "investment_amount"),
        }
    }
}

/// Derived dilution summary. Price per share and ownership are rounded to
/// two decimals; share counts and post-money to whole units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CapTableSummary {
    pub fully_diluted: i64,
    pub price_per_share: f64,
    pub new_shares: i64,
    pub post_money: i64,
    /// Percent of the post-money owned by the new investment.
    pub investor_ownership: f64,
}

pub fn cap_table(inputs: &CapTableInputs) -> CapTableSummary {
    let fully_diluted = inputs.common_shares
        + inputs.options_outstanding
        + inputs.option_pool_authorized
        + inputs.warrants
        + inputs.safe_note_conversion_shares;
    let price_per_share = if fully_diluted > 0.0 {
        inputs.pre_money_valuation / fully_diluted
    } else {
        0.0
    };
    let new_shares = if price_per_share > 0.0 {
        inputs.investment_amount / price_per_share
    } else {
        0.0
    };
    let post_money = inputs.pre_money_valuation + inputs.investment_amount;
    let investor_ownership = if post_money > 0.0 {
        inputs.investment_amount / post_money * 100.0
    } else {
        0.0
    };

    CapTableSummary {
        fully_diluted: fully_diluted.round() as i64,
        price_per_share: (price_per_share * 100.0).round() / 100.0,
        new_shares: new_shares.round() as i64,
        post_money: post_money.round() as i64,
        investor_ownership: (investor_ownership * 100.0).round() / 100.0,
    }
}

/// DCF output, whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DcfResult {
    pub enterprise_value: i64,
    /// Present value of the terminal value.
    pub terminal_value: i64,
}

/// Discounted cash flow over a yearly FCF series. Rates are percents.
/// A discount rate that is non-positive or not above the terminal growth
/// rate is economically invalid input and yields a zero valuation.
pub fn dcf(fcf: &[f64], discount_rate_pct: f64, terminal_growth_pct: f64) -> DcfResult {
    let r = discount_rate_pct / 100.0;
    let g = terminal_growth_pct / 100.0;

    if r <= 0.0 || r <= g || fcf.is_empty() {
        return DcfResult {
            enterprise_value: 0,
            terminal_value: 0,
        };
    }

    let mut pv_sum = 0.0;
    for (i, cash) in fcf.iter().enumerate() {
        pv_sum += cash / (1.0 + r).powi(i as i32 + 1);
    }

    let last = fcf[fcf.len() - 1];
    let terminal = last * (1.0 + g) / (r - g);
    let pv_terminal = terminal / (1.0 + r).powi(fcf.len() as i32);

    DcfResult {
        enterprise_value: (pv_sum + pv_terminal).round() as i64,
        terminal_value: pv_terminal.round() as i64,
    }
}

/// Method weights for the blended valuation, as percents. Weights are not
/// normalized here; the sum-to-100 check is a validator concern.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValuationWeights {
    pub dcf: f64,
    pub comps: f64,
    pub precedent: f64,
}

impl ValuationWeights {
    pub fn from_blob(blob: &Value) -> Self {
        ValuationWeights {
            dcf: loose_field(blob, "dcf_weight"),
            comps: loose_field(blob, "comps_weight"),
            precedent: loose_field(blob, "precedent_weight"),
        }
    }
}

/// Weighted combination of the three valuation methods.
pub fn blended_valuation(
    dcf_value: f64,
    comps_value: f64,
    precedent_value: f64,
    weights: &ValuationWeights,
) -> i64 {
    let blended = dcf_value * weights.dcf / 100.0
        + comps_value * weights.comps / 100.0
        + precedent_value * weights.precedent / 100.0;
    blended.round() as i64
}
