//! 의존성 그래프 -- 정규화된 패키지 노드와 탐색 연산
//!
//! 세 lockfile 파서는 모두 [`GraphBuilder`]를 통해 하나의 [`DependencyGraph`]를 생성합니다.
//! 노드는 arena(`Vec<PackageNode>`)에 저장되고 [`NodeId`]로 참조되며,
//! `(name, version)` 키로 중복 제거됩니다.
//!
//! # 불변 조건
//!
//! - 노드 하나는 정확히 하나의 해석된 버전을 가집니다.
//! - 같은 이름이 여러 버전으로 존재하면 별개의 노드입니다.
//! - 공유 하위 의존성(diamond)은 하나의 노드를 여러 부모가 참조합니다.
//! - `build()` 이후 모든 노드는 루트에서 도달 가능합니다.
//!
//! # 예시
//!
//! ```
//! use lockaudit_scanner::graph::GraphBuilder;
//!
//! let mut builder = GraphBuilder::new("example");
//! let app = builder.add_node("express", "4.18.2", None, false);
//! let dep = builder.add_node("accepts", "1.3.8", None, false);
//! builder.add_root(app);
//! builder.add_edge(app, dep);
//! let graph = builder.build();
//!
//! let path = graph.shortest_path_from_root(graph.lookup("accepts", "1.3.8").unwrap());
//! assert_eq!(path.map(|p| p.len()), Some(2));
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::debug;

use crate::types::PackageKey;

/// 그래프 내 노드 식별자
///
/// 해당 그래프(또는 빌더) 안에서만 유효합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// arena 인덱스를 반환합니다.
    pub fn index(self) -> usize {
        self.0
    }
}

/// 해석된 패키지 인스턴스 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    /// 패키지 이름
    pub name: String,
    /// 정확히 해석된 버전
    pub version: String,
    /// 무결성 체크섬 (검증하지 않고 그대로 전달)
    pub integrity: Option<String>,
    /// 루트 매니페스트에 직접 선언된 의존성인지 여부
    pub is_direct: bool,
    /// lockfile이 개발 전용으로 표시한 패키지인지 여부
    pub dev: bool,
    /// 자식 노드 (선언 순서)
    pub children: Vec<NodeId>,
}

impl PackageNode {
    /// `(name, version)` 키를 반환합니다.
    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name, &self.version)
    }
}

/// 하나의 감사 대상 프로젝트의 의존성 그래프
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    source: String,
    nodes: Vec<PackageNode>,
    index: HashMap<PackageKey, NodeId>,
    roots: Vec<NodeId>,
}

impl DependencyGraph {
    /// 그래프의 출처 (lockfile 경로 또는 패키지 식별자)
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 직접 선언된 최상위 의존성 (선언 순서)
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// 노드를 조회합니다.
    pub fn node(&self, id: NodeId) -> Option<&PackageNode> {
        self.nodes.get(id.0)
    }

    /// `(name, version)`으로 노드를 조회합니다.
    pub fn lookup(&self, name: &str, version: &str) -> Option<NodeId> {
        self.index.get(&PackageKey::new(name, version)).copied()
    }

    /// 고유한 노드 수
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 노드가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 모든 고유 노드를 삽입 순서대로 순회합니다.
    pub fn all_nodes(&self) -> impl Iterator<Item = (NodeId, &PackageNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (NodeId(idx), node))
    }

    /// 그래프의 `(name, version)` 키 집합
    pub fn keys(&self) -> BTreeSet<PackageKey> {
        self.nodes.iter().map(PackageNode::key).collect()
    }

    /// 루트에서 `target`까지의 최단 경로를 반환합니다.
    ///
    /// 루트를 선언 순서대로, 자식을 선언 순서대로 큐에 넣는 BFS이므로
    /// 길이가 같은 경로가 여러 개면 먼저 선언된 쪽이 선택됩니다.
    /// 반환 경로는 루트로 시작해 `target`으로 끝납니다.
    /// 도달할 수 없으면 `None`입니다.
    pub fn shortest_path_from_root(&self, target: NodeId) -> Option<Vec<NodeId>> {
        if target.0 >= self.nodes.len() {
            return None;
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut parent: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut queue = VecDeque::new();

        for &root in &self.roots {
            if !visited[root.0] {
                visited[root.0] = true;
                queue.push_back(root);
            }
        }

        while let Some(current) = queue.pop_front() {
            if current == target {
                let mut path = vec![current];
                let mut cursor = current;
                while let Some(prev) = parent[cursor.0] {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }

            for &child in &self.nodes[current.0].children {
                if !visited[child.0] {
                    visited[child.0] = true;
                    parent[child.0] = Some(current);
                    queue.push_back(child);
                }
            }
        }

        None
    }

    /// 노드 경로를 키 목록으로 변환합니다.
    pub fn path_keys(&self, path: &[NodeId]) -> Vec<PackageKey> {
        path.iter()
            .filter_map(|id| self.node(*id))
            .map(PackageNode::key)
            .collect()
    }

    /// 형식과 무관한 구조 비교용 요약을 반환합니다.
    pub fn shape(&self) -> GraphShape {
        let roots = self
            .roots
            .iter()
            .filter_map(|id| self.node(*id))
            .map(PackageNode::key)
            .collect();

        let edges = self
            .nodes
            .iter()
            .map(|node| {
                let children = node
                    .children
                    .iter()
                    .filter_map(|id| self.node(*id))
                    .map(PackageNode::key)
                    .collect();
                (node.key(), children)
            })
            .collect();

        GraphShape { roots, edges }
    }
}

/// 그래프 구조 요약
///
/// 선언 순서를 무시하므로 같은 논리 트리를 기술하는 서로 다른 lockfile 형식의
/// 그래프를 비교할 때 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphShape {
    /// 루트 키 집합
    pub roots: BTreeSet<PackageKey>,
    /// 노드별 자식 키 집합 (모든 노드 포함)
    pub edges: BTreeMap<PackageKey, BTreeSet<PackageKey>>,
}

/// [`DependencyGraph`] 빌더
///
/// 파서는 노드와 간선을 추가한 뒤 `build()`로 불변 그래프를 얻습니다.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    source: String,
    nodes: Vec<PackageNode>,
    index: HashMap<PackageKey, NodeId>,
    roots: Vec<NodeId>,
}

impl GraphBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// 노드를 추가하거나 기존 노드를 반환합니다.
    ///
    /// 같은 키가 다시 추가되면 `dev`는 모든 출현이 개발 전용일 때만 유지되고,
    /// `integrity`는 처음 알려진 값을 사용합니다.
    pub fn add_node(
        &mut self,
        name: &str,
        version: &str,
        integrity: Option<&str>,
        dev: bool,
    ) -> NodeId {
        let key = PackageKey::new(name, version);
        if let Some(&id) = self.index.get(&key) {
            let node = &mut self.nodes[id.0];
            node.dev &= dev;
            if node.integrity.is_none() {
                node.integrity = integrity.map(str::to_owned);
            }
            return id;
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(PackageNode {
            name: key.name.clone(),
            version: key.version.clone(),
            integrity: integrity.map(str::to_owned),
            is_direct: false,
            dev,
            children: Vec::new(),
        });
        self.index.insert(key, id);
        id
    }

    /// `(name, version)`으로 노드를 조회합니다.
    pub fn lookup(&self, name: &str, version: &str) -> Option<NodeId> {
        self.index.get(&PackageKey::new(name, version)).copied()
    }

    /// 노드의 키를 반환합니다 (에러 메시지용).
    pub fn key_of(&self, id: NodeId) -> Option<PackageKey> {
        self.nodes.get(id.0).map(PackageNode::key)
    }

    /// 부모에서 자식으로의 간선을 추가합니다 (중복 무시).
    pub fn add_edge(&mut self, parent: NodeId, child: NodeId) {
        let children = &mut self.nodes[parent.0].children;
        if !children.contains(&child) {
            children.push(child);
        }
    }

    /// 노드를 루트(직접 의존성)로 등록합니다 (중복 무시).
    pub fn add_root(&mut self, id: NodeId) {
        self.nodes[id.0].is_direct = true;
        if !self.roots.contains(&id) {
            self.roots.push(id);
        }
    }

    /// 등록된 루트 수
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// 부모가 없는 노드를 삽입 순서대로 반환합니다.
    pub fn nodes_without_parents(&self) -> Vec<NodeId> {
        let mut has_parent = vec![false; self.nodes.len()];
        for (idx, node) in self.nodes.iter().enumerate() {
            // 자기 참조는 부모로 치지 않음
            for child in node.children.iter().filter(|c| c.0 != idx) {
                has_parent[child.0] = true;
            }
        }
        has_parent
            .iter()
            .enumerate()
            .filter(|(_, has)| !**has)
            .map(|(idx, _)| NodeId(idx))
            .collect()
    }

    /// 루트에서 도달할 수 없는 노드를 삽입 순서대로 루트로 승격합니다.
    ///
    /// 매니페스트 정보가 없는 형식(yarn classic, npm v1)에서 순환 의존성만으로
    /// 이루어진 컴포넌트를 그래프에 남기기 위해 사용합니다. 승격된 수를 반환합니다.
    pub fn promote_unreached_to_roots(&mut self) -> usize {
        let mut reached = self.reachable();
        let mut promoted = 0;
        for idx in 0..self.nodes.len() {
            if reached[idx] {
                continue;
            }
            self.add_root(NodeId(idx));
            promoted += 1;
            self.mark_reachable_from(NodeId(idx), &mut reached);
        }
        promoted
    }

    /// 불변 그래프를 생성합니다.
    ///
    /// 루트에서 도달할 수 없는 노드는 제거되고, 남은 노드는 삽입 순서를 유지합니다.
    pub fn build(self) -> DependencyGraph {
        let reached = self.reachable();
        let pruned = reached.iter().filter(|r| !**r).count();
        if pruned > 0 {
            debug!(
                source = %self.source,
                pruned,
                "dropping packages unreachable from the root manifest"
            );
        }

        let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut next = 0;
        for (idx, keep) in reached.iter().enumerate() {
            if *keep {
                remap[idx] = Some(NodeId(next));
                next += 1;
            }
        }

        let mut nodes = Vec::with_capacity(next);
        let mut index = HashMap::with_capacity(next);
        for (idx, mut node) in self.nodes.into_iter().enumerate() {
            let Some(new_id) = remap[idx] else {
                continue;
            };
            node.children = node.children.iter().filter_map(|c| remap[c.0]).collect();
            index.insert(node.key(), new_id);
            nodes.push(node);
        }

        let roots = self.roots.iter().filter_map(|r| remap[r.0]).collect();

        DependencyGraph {
            source: self.source,
            nodes,
            index,
            roots,
        }
    }

    fn reachable(&self) -> Vec<bool> {
        let mut reached = vec![false; self.nodes.len()];
        for &root in &self.roots {
            self.mark_reachable_from(root, &mut reached);
        }
        reached
    }

    fn mark_reachable_from(&self, start: NodeId, reached: &mut [bool]) {
        if reached[start.0] {
            return;
        }
        reached[start.0] = true;
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for &child in &self.nodes[current.0].children {
                if !reached[child.0] {
                    reached[child.0] = true;
                    stack.push(child);
                }
            }
        }
    }
}
