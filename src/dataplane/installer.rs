//! Multi-hop path installation
//!
//! Programs one flow per switch on a path. There is no transaction across
//! switches: if programming fails midway the already-programmed hops stay in
//! place and `Error::PartialInstall` is returned. A failure on the first hop
//! returns the switch's own error since nothing was programmed. A later packet of the same
//! flow re-runs the decision and re-issues every rule, which reconverges the
//! path because switches overwrite rules with the same `(priority, match)`.

use crate::switch::{FlowAction, FlowMatch, FlowRule, PortNo, SwitchId, SwitchRegistry};
use crate::topology::TopologyGraph;
use crate::{Error, Result};
use tracing::{debug, trace, warn};

/// Priority of path flows, above the table-miss rule
pub const PATH_FLOW_PRIORITY: u16 = 1;

/// What to install along a path. Built per decision, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathIntent {
    /// Simple path from ingress switch to egress switch
    pub path: Vec<SwitchId>,
    /// Match used on every hop
    pub matcher: FlowMatch,
    /// Actions prepended to every hop's output
    pub pre_actions: Vec<FlowAction>,
    /// Output port on the last switch
    pub final_port: PortNo,
}

impl PathIntent {
    /// Rule for each switch on the path, in path order.
    pub fn rules(&self, graph: &TopologyGraph) -> Result<Vec<(SwitchId, FlowRule)>> {
        let last = *self
            .path
            .last()
            .ok_or_else(|| Error::InvalidPath("empty path".into()))?;

        let mut rules = Vec::with_capacity(self.path.len());
        for hop in self.path.windows(2) {
            let (here, next) = (hop[0], hop[1]);
            let edge = graph.edge(here, next).ok_or_else(|| {
                Error::InvalidPath(format!("no edge {here} -> {next} in topology"))
            })?;
            rules.push((here, self.rule_out(edge.src_port)));
        }
        rules.push((last, self.rule_out(self.final_port)));

        Ok(rules)
    }

    fn rule_out(&self, port: PortNo) -> FlowRule {
        let mut actions = self.pre_actions.clone();
        actions.push(FlowAction::Output(port));
        FlowRule::new(PATH_FLOW_PRIORITY, self.matcher, actions)
    }
}

/// Programs path flows through the switch registry.
pub struct PathInstaller<'a> {
    switches: &'a SwitchRegistry,
}

impl<'a> PathInstaller<'a> {
    pub fn new(switches: &'a SwitchRegistry) -> Self {
        Self { switches }
    }

    /// Install `intent` and return the port the first switch forwards on,
    /// which is where the triggering packet should be sent.
    ///
    /// Every rule is computed before anything is programmed, so a path that
    /// does not fit the graph fails without side effects.
    pub fn install(&self, graph: &TopologyGraph, intent: &PathIntent) -> Result<PortNo> {
        let rules = intent.rules(graph)?;
        let total = rules.len();

        let ingress_port = rules
            .first()
            .and_then(|(_, rule)| rule.output_port())
            .ok_or_else(|| Error::InvalidPath("path has no ingress hop".into()))?;

        for (installed, (switch, rule)) in rules.iter().enumerate() {
            trace!("Programming {}: {}", switch, rule);
            let result = self
                .switches
                .get(*switch)
                .and_then(|conn| conn.program(rule));
            if let Err(source) = result {
                if installed == 0 {
                    warn!(
                        "Path {:?} not installed, switch {} failed: {}",
                        intent.path, switch, source
                    );
                    return Err(source);
                }
                warn!(
                    "Path {:?} partially installed: {}/{} flows, switch {} failed: {}",
                    intent.path, installed, total, switch, source
                );
                return Err(Error::PartialInstall {
                    installed,
                    total,
                    switch: *switch,
                    source: Box::new(source),
                });
            }
        }

        debug!(
            "Installed {} flows for {} along {:?}",
            total, intent.matcher, intent.path
        );
        Ok(ingress_port)
    }
}
