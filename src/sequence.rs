use std::collections::BTreeSet;

/// Atribui números de sequência e correlaciona respostas com as sondas em
/// voo desta sessão.
#[derive(Debug)]
pub struct SequenceTracker {
    identifier: u16,
    next: u16,
    outstanding: BTreeSet<u16>,
}

impl SequenceTracker {
    pub fn new(identifier: u16) -> Self {
        Self {
            identifier,
            next: 1,
            outstanding: BTreeSet::new(),
        }
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    /// Próxima sequência, já marcada como pendente. Dá a volta em 65535 -> 0.
    pub fn next(&mut self) -> u16 {
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        self.outstanding.insert(seq);
        seq
    }

    /// Uma resposta só pertence à sessão se o identifier for o nosso e a
    /// sequência ainda estiver pendente. Identifiers de outros processos são
    /// ignorados silenciosamente.
    pub fn matches(&self, identifier: u16, sequence: u16) -> bool {
        identifier == self.identifier && self.outstanding.contains(&sequence)
    }

    /// Aposenta a sonda (resposta casada ou prazo esgotado).
    pub fn retire(&mut self, sequence: u16) -> bool {
        self.outstanding.remove(&sequence)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }
}
