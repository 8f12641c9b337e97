/*!

This is the long-form manual for `ballot_tally` and `cdetally`.

## Preference strings

A vote is stored as a preference string over the tokens of its ballot. The
tokens are the candidate monikers in ballot order, followed by the bar
`_bar_` if the ballot has one.

* `>` separates rank groups, the best group first.
* `=` ties the tokens of one group.
* every token appears exactly once.

Examples for a ballot with candidates `A`, `B`, `C` and the bar:

| string          | meaning                                             |
|-----------------|-----------------------------------------------------|
| `A>B>_bar_>C`   | A first, then B. C is rejected.                     |
| `B>A=C>_bar_`   | B first, then A and C tied. All are acceptable.     |
| `_bar_>A>B>C`   | Against all candidates.                             |
| `A=B=C=_bar_`   | Abstention.                                         |

Forms submit `_abstain_` for an explicit abstention. It is stored as the
string with every token tied. No candidate may be called `_abstain_`.

### Classical ballots

A classical ballot lets each voter pick up to `N` candidates. The stored
string then has one of these shapes:

* `chosen>_bar_>rest`, or `chosen>_bar_` if every candidate is chosen,
* `chosen=_bar_>rest`,
* `_bar_>rest`: against all candidates,
* everything tied: abstention,
* `chosen>rest` on a ballot without bar.

At most `N` candidates may be chosen. They are tied among themselves.

## Counting

Ballots are counted with the Schulze method. The bar takes part like any
candidate. Ties are not broken: the result is a list of rank groups, and the
top group wins. When the bar is alone in the top group, every candidate is
rejected.

## Quorum

A ballot with an extension end and a quorum is looked at once its regular
period is over. If fewer voters than the quorum took part, voting goes on
until the extension end. That decision is recorded and is not revisited.

## Result files

A tallied ballot is published as JSON:

```json
{
  "assemblyId": 1,
  "ballotId": 3,
  "title": "Vorstandswahl",
  "candidates": [
    { "moniker": "Anna", "description": "Anna Lyse" },
    { "moniker": "Bert", "description": "Bert Ram" }
  ],
  "useBar": true,
  "votesAllowed": null,
  "result": "Anna>Bert>_bar_",
  "voteCount": 2,
  "votes": [
    { "vote": "Anna>Bert>_bar_", "salt": "x3Tq0aPbL2Ks", "hash": "1f0c..." },
    { "vote": "Bert>Anna>_bar_", "salt": "Qm8vR1nZcE4y", "hash": "9ad2..." }
  ]
}
```

The hash of a vote is the hex SHA-256 of the attendee secret, the vote and
the salt, concatenated. Only the holder of the secret can recognise their
vote.

## Verifying with `cdetally`

```text
cdetally --input ballot_3.json
cdetally --input ballot_3.json --secret <attendee secret>
cdetally --input ballot_3.json --out stdout
cdetally --input ballot_3.json --reference summary.json
```

`cdetally` recounts every vote of the file and fails if the ranking differs
from the published one. `--secret` prints the vote cast with that secret.
`--out` writes the recounted summary, `--reference` compares it against a
summary written earlier.

*/
