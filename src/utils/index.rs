/// Render an atomic amount with a fixed number of decimals, e.g. `1500000000000` with 12
/// decimals becomes `1.500000000000`.
pub fn format_money(amount: u64, decimals: u32) -> String {
	if decimals == 0 {
		return amount.to_string();
	}
	let unit = 10u64.saturating_pow(decimals);
	format!(
		"{}.{:0width$}",
		amount / unit,
		amount % unit,
		width = decimals as usize
	)
}

/// Current wall-clock time as Unix seconds.
pub fn unix_now() -> u64 {
	u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
