use crate::config::AppConfig;
use crate::models::{
    Candidate, Catalog, Category, DecisionQuery, DecisionSet, EntryId, LineIssue, LineMatch,
    LineOutcome, OrderSheet, QueryKind, ReferenceData,
};
use crate::service::allocator::allocate;
use crate::service::categorizer::{apply_order_cohesion, categorize};
use crate::service::inventory::InventoryIndex;
use crate::service::matcher::{match_merchant, match_product};
use crate::service::report::{ReportBuilder, RunReport};
use crate::service::resolver::{related_candidates, Resolver};
use rayon::prelude::*;

/// 匹配阶段产物：按日期排序后的订单行及其匹配结果 (一一对应)
#[derive(Debug, Clone)]
pub struct Analysis {
    pub orders: OrderSheet,
    pub matches: Vec<LineMatch>,
}

impl Analysis {
    pub fn len(&self) -> usize {
        self.orders.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.lines.is_empty()
    }
}

/// 对账引擎
///
/// 三个阶段：匹配 (analyze) -> 收集待决问题 (collect_queries) -> 分配归类 (execute)。
/// 每次 execute 使用独立的库存索引，多次运行之间互不影响。
pub struct ReconciliationEngine {
    config: AppConfig,
}

impl ReconciliationEngine {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 阶段一：排序并匹配全部订单行
    pub fn analyze(&self, mut orders: OrderSheet, reference: &ReferenceData) -> Analysis {
        // 稳定排序，同日期保持原始行序
        orders.lines.sort_by_key(|l| l.order_date);

        let min_score = self.config.matching.partial_min_score;
        let matches: Vec<LineMatch> = orders
            .lines
            .par_iter()
            .map(|line| LineMatch {
                product: match_product(&line.product_name, &reference.catalog, min_score),
                merchant: match_merchant(&line.merchant_name, &reference.merchants),
            })
            .collect();

        let exact = matches.iter().filter(|m| m.product.is_exact()).count();
        let fuzzy = matches.iter().filter(|m| m.product.is_fuzzy()).count();
        let merchants = matches.iter().filter(|m| m.merchant.is_exact()).count();
        tracing::info!(
            "匹配完成: {} 行, 商品精确 {} / 模糊 {}, 商户精确 {}",
            orders.lines.len(),
            exact,
            fuzzy,
            merchants
        );

        Analysis { orders, matches }
    }

    /// 阶段二：收集需要调用方答复的问题
    ///
    /// 在库存副本上按日期顺序模拟分配 (只用主商品)，据此判断哪些行会缺货
    pub fn collect_queries(
        &self,
        analysis: &Analysis,
        reference: &ReferenceData,
    ) -> Vec<DecisionQuery> {
        let catalog = &reference.catalog;
        let mut inventory = InventoryIndex::from_catalog(catalog);
        let mut queries = Vec::new();

        for (line, m) in analysis.orders.lines.iter().zip(&analysis.matches) {
            let Some(entry) = m.product.entry else {
                continue;
            };
            let matched_name = catalog.name_of(entry).to_string();

            if line.is_return() {
                if self.config.matching.restock_returns {
                    inventory.restock(entry, line.requested());
                }
                continue;
            }

            if m.product.is_fuzzy() {
                queries.push(DecisionQuery {
                    line_id: line.line_id,
                    order_id: line.order_id.clone(),
                    kind: QueryKind::ConfirmMatch,
                    input_product: line.product_name.clone(),
                    matched_product: matched_name.clone(),
                    candidates: vec![Candidate {
                        name: matched_name.clone(),
                        available_stock: inventory.available(entry),
                        score: Some(m.product.score),
                    }],
                    main_stock: inventory.available(entry),
                    required_qty: line.requested(),
                });
            }

            if !m.merchant.is_exact() {
                continue;
            }

            let requested = line.requested();
            let main_stock = inventory.available(entry);
            if main_stock < requested {
                let variants = stocked(catalog, &inventory, catalog.variant_candidates(entry));
                let variant_stock: i64 = variants
                    .iter()
                    .fold(0i64, |acc, c| acc.saturating_add(c.available_stock));
                if !variants.is_empty() {
                    queries.push(DecisionQuery {
                        line_id: line.line_id,
                        order_id: line.order_id.clone(),
                        kind: QueryKind::Variant,
                        input_product: line.product_name.clone(),
                        matched_product: matched_name.clone(),
                        candidates: variants,
                        main_stock,
                        required_qty: requested,
                    });
                }

                if main_stock.saturating_add(variant_stock) < requested {
                    let exclude = catalog.variant_candidates(entry);
                    let related = stocked(
                        catalog,
                        &inventory,
                        related_candidates(catalog, entry, &exclude, &self.config.matching),
                    );
                    if !related.is_empty() {
                        queries.push(DecisionQuery {
                            line_id: line.line_id,
                            order_id: line.order_id.clone(),
                            kind: QueryKind::Related,
                            input_product: line.product_name.clone(),
                            matched_product: matched_name.clone(),
                            candidates: related,
                            main_stock,
                            required_qty: requested,
                        });
                    }
                }
            }

            allocate(line, &[entry], catalog, &mut inventory);
        }

        tracing::info!("待确认问题: {} 条", queries.len());
        queries
    }

    /// 阶段三：按决策解析、分配、归类并生成报表
    pub fn execute(
        &self,
        analysis: &Analysis,
        reference: &ReferenceData,
        decisions: &DecisionSet,
    ) -> RunReport {
        let catalog = &reference.catalog;
        let mut inventory = InventoryIndex::from_catalog(catalog);
        let resolver = Resolver::new(catalog, &self.config.matching);
        let total = analysis.len();
        let mut outcomes = Vec::with_capacity(total);

        tracing::info!("开始分配: {} 行, {} 条决策", total, decisions.len());

        for (idx, (line, m)) in analysis.orders.lines.iter().zip(&analysis.matches).enumerate() {
            if idx == 0 || (idx + 1) % 100 == 0 {
                tracing::info!("处理进度: {}/{}", idx + 1, total);
            }

            let resolved = resolver.resolve(line, m, decisions, &inventory);
            let mut outcome = LineOutcome {
                line: line.clone(),
                matches: m.clone(),
                confirmed: resolved.confirmed,
                needs_confirmation: resolved.needs_confirmation,
                state: resolved.state,
                issues: resolved.issues.clone(),
                allocations: Vec::new(),
                shortfall: 0,
                substitutes: Vec::new(),
                return_batch: None,
                category: Category::Error,
                sheet: Category::Error,
                cohesion_note: None,
            };

            if line.is_return() {
                if let Some(entry) = resolved.entry {
                    let target = if self.config.matching.restock_returns {
                        inventory.restock(entry, line.requested())
                    } else {
                        inventory.fullest_batch(entry)
                    };
                    outcome.return_batch = target
                        .and_then(|r| inventory.batch(r))
                        .map(|b| (b.batch_id.clone(), b.product_id.clone()));
                }
            } else if let Some(entry) = resolved.entry.filter(|_| resolved.is_resolved()) {
                let allocation = allocate(line, &resolved.eligible, catalog, &mut inventory);
                if !allocation.is_complete() {
                    tracing::warn!(
                        "行 {} 库存不足: 需要 {}, 仅分配 {}",
                        line.line_id,
                        line.quantity,
                        allocation.allocated()
                    );
                    outcome.issues.push(LineIssue::InsufficientStock {
                        requested: line.quantity,
                        fulfilled: allocation.allocated(),
                        product: catalog.name_of(entry).to_string(),
                    });
                }
                if allocation.records.len() > 1 {
                    tracing::debug!(
                        "行 {} 拆分到 {} 个批次",
                        line.line_id,
                        allocation.records.len()
                    );
                }
                outcome.shortfall = allocation.shortfall;
                outcome.allocations = allocation.records;
                outcome.substitutes = substitute_names(catalog, resolved.eligible.get(1..).unwrap_or(&[]));
            }

            outcome.category = categorize(&outcome);
            outcome.sheet = outcome.category;
            outcomes.push(outcome);
        }

        if self.config.matching.keep_orders_together {
            apply_order_cohesion(&mut outcomes);
        }
        tracing::info!("分配完成, 变动批次 {} 个", inventory.touched_count());

        ReportBuilder::new(&self.config.report).build(outcomes, reference, &analysis.orders)
    }

    /// 匹配并返回待确认问题
    pub fn questions(&self, orders: OrderSheet, reference: &ReferenceData) -> Vec<DecisionQuery> {
        let analysis = self.analyze(orders, reference);
        self.collect_queries(&analysis, reference)
    }

    /// 一次完整运行
    pub fn run(
        &self,
        orders: OrderSheet,
        reference: &ReferenceData,
        decisions: &DecisionSet,
    ) -> RunReport {
        let analysis = self.analyze(orders, reference);
        self.execute(&analysis, reference, decisions)
    }
}

/// 过滤出当前有库存的候选
fn stocked(catalog: &Catalog, inventory: &InventoryIndex, ids: Vec<EntryId>) -> Vec<Candidate> {
    ids.into_iter()
        .filter_map(|id| {
            let stock = inventory.available(id);
            (stock > 0).then(|| Candidate {
                name: catalog.name_of(id).to_string(),
                available_stock: stock,
                score: None,
            })
        })
        .collect()
}

fn substitute_names(catalog: &Catalog, ids: &[EntryId]) -> Vec<String> {
    ids.iter().map(|&id| catalog.name_of(id).to_string()).collect()
}
