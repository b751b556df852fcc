use crate::config::DATE_FORMAT;
use crate::data::PricePoint;
use clap::ValueEnum;

/// Best trade found by one of the profit scans.
///
/// `buy` and `sell` are set together, and only when `profit > 0` for a
/// single buy/sell pair. Multi-trade scans leave them empty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TradeResult {
    pub profit: f64,
    pub buy: Option<PricePoint>,
    pub sell: Option<PricePoint>,
}

impl TradeResult {
    pub const NONE: Self = Self {
        profit: 0.0,
        buy: None,
        sell: None,
    };

    pub fn is_profitable(&self) -> bool {
        self.profit > 0.0
    }

    /// Human-readable result block shown by every front end.
    pub fn summary(&self, algorithm: ProfitAlgorithm) -> String {
        let label = algorithm.label();
        match (self.buy, self.sell) {
            (Some(buy), Some(sell)) => format!(
                "{} Profit: ${:.2} per share\nBuy Date: {}\nSell Date: {}",
                label,
                self.profit,
                buy.date.format(DATE_FORMAT),
                sell.date.format(DATE_FORMAT)
            ),
            _ if self.is_profitable() => format!(
                "{} Profit: ${:.2} per share\nAcross multiple trades",
                label, self.profit
            ),
            _ => format!("{}: No profitable trade found.", label),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProfitAlgorithm {
    /// One-pass running-minimum scan
    Greedy,
    /// Prefix-best table over the series
    #[value(name = "dp")]
    DynamicProgramming,
    /// Sum of every rising day (unlimited trades)
    #[value(name = "deltas")]
    PositiveDeltas,
}

impl ProfitAlgorithm {
    pub const ALL: [ProfitAlgorithm; 3] = [
        ProfitAlgorithm::Greedy,
        ProfitAlgorithm::DynamicProgramming,
        ProfitAlgorithm::PositiveDeltas,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Greedy => "Greedy",
            Self::DynamicProgramming => "DP",
            Self::PositiveDeltas => "Positive Deltas",
        }
    }

    pub fn run(self, points: &[PricePoint]) -> TradeResult {
        match self {
            Self::Greedy => max_profit_greedy(points),
            Self::DynamicProgramming => max_profit_dynamic(points),
            Self::PositiveDeltas => TradeResult {
                profit: max_profit_positive_deltas(points),
                buy: None,
                sell: None,
            },
        }
    }
}

/// Single-transaction max profit in one pass.
///
/// Ties resolve to the earliest buy day (strict `<` on the running minimum)
/// and the earliest sell day reaching the best profit (strict `>`).
pub fn max_profit_greedy(points: &[PricePoint]) -> TradeResult {
    let mut best = TradeResult::NONE;
    let mut min_point: Option<PricePoint> = None;

    for &point in points {
        match min_point {
            Some(min) if point.close >= min.close => {
                let profit = point.close - min.close;
                if profit > best.profit {
                    best = TradeResult {
                        profit,
                        buy: Some(min),
                        sell: Some(point),
                    };
                }
            }
            _ => min_point = Some(point),
        }
    }

    best
}

/// Single-transaction max profit via the prefix table
/// `dp[i] = max(dp[i-1], price[i] - min(price[..i]))`.
///
/// Agrees with [`max_profit_greedy`] on profit and on both dates.
pub fn max_profit_dynamic(points: &[PricePoint]) -> TradeResult {
    let n = points.len();
    if n < 2 {
        return TradeResult::NONE;
    }

    let mut dp = vec![0.0_f64; n];
    let mut best = TradeResult::NONE;
    // Index of the earliest minimum of points[..i].
    let mut min_idx = 0;

    for i in 1..n {
        let sell_now = points[i].close - points[min_idx].close;
        dp[i] = dp[i - 1].max(sell_now);

        if dp[i] > best.profit {
            best = TradeResult {
                profit: dp[i],
                buy: Some(points[min_idx]),
                sell: Some(points[i]),
            };
        }

        if points[i].close < points[min_idx].close {
            min_idx = i;
        }
    }

    best
}

/// Upper bound with unlimited trades: the sum of all positive day-over-day moves.
pub fn max_profit_positive_deltas(points: &[PricePoint]) -> f64 {
    points
        .windows(2)
        .map(|w| w[1].close - w[0].close)
        .filter(|delta| *delta > 0.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceSeries;
    use chrono::NaiveDate;
    use rand::Rng;

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceSeries::from_closes("TEST", start, closes).points
    }

    fn brute_force(points: &[PricePoint]) -> f64 {
        let mut best = 0.0_f64;
        for i in 0..points.len() {
            for j in i + 1..points.len() {
                best = best.max(points[j].close - points[i].close);
            }
        }
        best
    }

    #[test]
    fn test_greedy_classic_case() {
        let pts = series(&[7.0, 1.0, 5.0, 3.0, 6.0, 4.0]);
        let r = max_profit_greedy(&pts);
        assert_eq!(r.profit, 5.0);
        assert_eq!(r.buy.unwrap().date, pts[1].date);
        assert_eq!(r.sell.unwrap().date, pts[4].date);
    }

    #[test]
    fn test_falling_series_has_no_trade() {
        let pts = series(&[9.0, 7.0, 4.0, 1.0]);
        for algo in ProfitAlgorithm::ALL {
            let r = algo.run(&pts);
            assert_eq!(r, TradeResult::NONE, "{:?}", algo);
            assert_eq!(
                r.summary(algo),
                format!("{}: No profitable trade found.", algo.label())
            );
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(max_profit_greedy(&[]), TradeResult::NONE);
        assert_eq!(max_profit_dynamic(&[]), TradeResult::NONE);
        assert_eq!(max_profit_positive_deltas(&[]), 0.0);

        let one = series(&[42.0]);
        assert_eq!(max_profit_greedy(&one), TradeResult::NONE);
        assert_eq!(max_profit_dynamic(&one), TradeResult::NONE);

        let flat = series(&[3.0, 3.0, 3.0]);
        assert_eq!(max_profit_greedy(&flat), TradeResult::NONE);
        assert_eq!(max_profit_dynamic(&flat), TradeResult::NONE);
    }

    #[test]
    fn test_ties_pick_earliest_dates() {
        // Two equal minima (idx 1, 3) and two equal best sells (idx 2, 4).
        let pts = series(&[5.0, 1.0, 4.0, 1.0, 4.0]);
        for algo in [ProfitAlgorithm::Greedy, ProfitAlgorithm::DynamicProgramming] {
            let r = algo.run(&pts);
            assert_eq!(r.profit, 3.0);
            assert_eq!(r.buy.unwrap().date, pts[1].date, "{:?}", algo);
            assert_eq!(r.sell.unwrap().date, pts[2].date, "{:?}", algo);
        }
    }

    #[test]
    fn test_greedy_and_dp_agree_on_random_walks() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let len = rng.gen_range(0..40);
            let closes: Vec<f64> = (0..len).map(|_| rng.gen_range(1..20) as f64).collect();
            let pts = series(&closes);
            let g = max_profit_greedy(&pts);
            let d = max_profit_dynamic(&pts);
            assert_eq!(g, d, "closes={:?}", closes);
            assert_eq!(g.profit, brute_force(&pts), "closes={:?}", closes);
            if let (Some(buy), Some(sell)) = (g.buy, g.sell) {
                assert!(buy.date < sell.date);
                assert_eq!(sell.close - buy.close, g.profit);
            } else {
                assert_eq!(g.profit, 0.0);
            }
        }
    }

    #[test]
    fn test_positive_deltas() {
        let pts = series(&[7.0, 1.0, 5.0, 3.0, 6.0, 4.0]);
        assert_eq!(max_profit_positive_deltas(&pts), 7.0);
        let r = ProfitAlgorithm::PositiveDeltas.run(&pts);
        assert_eq!(r.profit, 7.0);
        assert!(r.buy.is_none() && r.sell.is_none());
        assert_eq!(
            r.summary(ProfitAlgorithm::PositiveDeltas),
            "Positive Deltas Profit: $7.00 per share\nAcross multiple trades"
        );
        // Never below the single-transaction profit.
        assert!(r.profit >= max_profit_greedy(&pts).profit);
    }

    #[test]
    fn test_summary_format() {
        let pts = series(&[100.0, 90.5, 120.25]);
        let r = max_profit_greedy(&pts);
        assert_eq!(
            r.summary(ProfitAlgorithm::Greedy),
            "Greedy Profit: $29.75 per share\nBuy Date: 2024-01-02\nSell Date: 2024-01-03"
        );
        assert!(r.summary(ProfitAlgorithm::DynamicProgramming).starts_with("DP Profit: $29.75"));
    }
}
